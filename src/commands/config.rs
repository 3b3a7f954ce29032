use anyhow::{Result, bail};
use log::debug;
use std::path::PathBuf;

use crate::{
    framework::TargetFramework,
    manifest::ManifestStore,
    project::{DirectoryProject, ProjectOptions},
    resolver::DependencyBehavior,
    runtime::Runtime,
    source::LocalFeed,
};

/// Everything a command needs, as given on the command line.
pub struct Config<R: Runtime> {
    pub runtime: R,
    pub feed: PathBuf,
    pub project_dir: PathBuf,
    /// Overrides the framework recorded in the project.
    pub framework: Option<TargetFramework>,
    pub behavior: DependencyBehavior,
    pub options: ProjectOptions,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, feed: PathBuf, project_dir: PathBuf) -> Self {
        Self {
            runtime,
            feed,
            project_dir,
            framework: None,
            behavior: DependencyBehavior::default(),
            options: ProjectOptions::default(),
        }
    }

    pub fn project(&self) -> DirectoryProject<'_, R> {
        DirectoryProject::new(&self.runtime, self.project_dir.clone())
    }

    pub fn manifest(&self) -> ManifestStore<'_, R> {
        ManifestStore::in_project(&self.runtime, &self.project_dir)
    }

    pub fn feed(&self, framework: TargetFramework) -> LocalFeed<'_, R> {
        LocalFeed::new(&self.runtime, self.feed.clone()).with_framework(framework)
    }

    /// The framework to work against: `--framework`, else the project's.
    pub fn target_framework(&self) -> Result<TargetFramework> {
        if let Some(framework) = self.framework {
            return Ok(framework);
        }
        let project = self.project();
        if project.is_initialized() {
            return Ok(project.load()?.framework);
        }
        debug!("No project at {:?}; resolving for any framework", self.project_dir);
        Ok(TargetFramework::ANY)
    }

    /// Make sure the project exists before anything is installed into it.
    pub fn ensure_project(&self) -> Result<()> {
        let project = self.project();
        if project.is_initialized() {
            return Ok(());
        }
        match self.framework {
            Some(framework) => project.init(framework),
            None => bail!(
                "No project found in {}. Pass --framework to create one.",
                self.project_dir.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    #[test]
    fn test_target_framework_prefers_flag() {
        let dir = tempdir().unwrap();
        let mut config = Config::new(RealRuntime, dir.path().join("feed"), dir.path().join("app"));
        assert!(config.target_framework().unwrap().is_any());

        config.framework = Some("net45".parse().unwrap());
        config.ensure_project().unwrap();
        config.framework = Some("net48".parse().unwrap());
        assert_eq!(config.target_framework().unwrap().to_string(), "net48");

        config.framework = None;
        assert_eq!(config.target_framework().unwrap().to_string(), "net45");
    }

    #[test]
    fn test_ensure_project_needs_framework() {
        let dir = tempdir().unwrap();
        let config = Config::new(RealRuntime, dir.path().join("feed"), dir.path().join("app"));
        assert!(config.ensure_project().is_err());
    }
}
