//! A project rooted at a directory, with its state kept in `project.json`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::{ImportLocation, ProjectAdapter};
use crate::framework::TargetFramework;
use crate::package::PackageContents;
use crate::runtime::{Runtime, resolve_under};

pub const PROJECT_FILE: &str = "project.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReference {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectImport {
    pub path: PathBuf,
    pub location: ImportLocation,
}

/// Everything a directory project records about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub framework: TargetFramework,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub references: Vec<ProjectReference>,
    #[serde(default)]
    pub framework_references: Vec<String>,
    /// Top imports first, then bottom imports, each in insertion order.
    #[serde(default)]
    pub imports: Vec<ProjectImport>,
    /// Assemblies covered by the last binding-redirect pass.
    #[serde(default)]
    pub binding_redirects: Vec<String>,
}

impl ProjectState {
    pub fn new(framework: TargetFramework) -> Self {
        Self {
            framework,
            properties: BTreeMap::new(),
            references: Vec::new(),
            framework_references: Vec::new(),
            imports: Vec::new(),
            binding_redirects: Vec::new(),
        }
    }
}

pub struct DirectoryProject<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> DirectoryProject<'a, R> {
    pub fn new(runtime: &'a R, root: PathBuf) -> Self {
        Self { runtime, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(PROJECT_FILE)
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.exists(&self.state_path())
    }

    /// Create `project.json` targeting `framework` unless it already exists.
    pub fn init(&self, framework: TargetFramework) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        info!("Initializing project {} for {}", self.root.display(), framework);
        self.save(&ProjectState::new(framework))
    }

    pub fn load(&self) -> Result<ProjectState> {
        let path = self.state_path();
        let text = self.runtime.read_to_string(&path).with_context(|| {
            format!("Project {} is not initialized", self.root.display())
        })?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, state: &ProjectState) -> Result<()> {
        let path = self.state_path();
        let content = serde_json::to_string_pretty(state)?;
        self.runtime
            .write_creating_dirs(&path, content.as_bytes())
            .with_context(|| format!("Failed to save project state to {:?}", path))
    }

    fn update(&self, change: impl FnOnce(&mut ProjectState)) -> Result<()> {
        let mut state = self.load()?;
        change(&mut state);
        self.save(&state)
    }

    /// Remove directories left empty by a file removal, up to the root.
    fn prune_empty_dirs(&self, file: &Path) -> Result<()> {
        let mut dir = file.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            if !self.runtime.read_dir(current)?.is_empty() {
                break;
            }
            debug!("Removing empty directory {}", current.display());
            self.runtime.remove_dir(current)?;
            dir = current.parent();
        }
        Ok(())
    }
}

#[async_trait]
impl<R: Runtime> ProjectAdapter for DirectoryProject<'_, R> {
    fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    fn unique_name(&self) -> String {
        self.root.display().to_string()
    }

    async fn target_framework(&self) -> Result<TargetFramework> {
        Ok(self.load()?.framework)
    }

    async fn property(&self, name: &str) -> Result<Option<String>> {
        let state = self.load()?;
        let explicit = state
            .properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone());
        Ok(explicit.or_else(|| match name.to_ascii_lowercase().as_str() {
            "rootnamespace" | "assemblyname" | "projectname" => Some(self.name()),
            "projectdir" => Some(self.root.display().to_string()),
            _ => None,
        }))
    }

    async fn reference_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .load()?
            .references
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case(name)))
    }

    #[tracing::instrument(skip(self))]
    async fn add_reference(&self, name: &str, path: &Path) -> Result<()> {
        self.update(|state| {
            state.references.retain(|r| !r.name.eq_ignore_ascii_case(name));
            state.references.push(ProjectReference {
                name: name.to_string(),
                path: path.to_path_buf(),
            });
        })
    }

    #[tracing::instrument(skip(self))]
    async fn remove_reference(&self, name: &str) -> Result<()> {
        self.update(|state| state.references.retain(|r| !r.name.eq_ignore_ascii_case(name)))
    }

    async fn add_framework_reference(&self, name: &str) -> Result<()> {
        self.update(|state| {
            if !state
                .framework_references
                .iter()
                .any(|r| r.eq_ignore_ascii_case(name))
            {
                state.framework_references.push(name.to_string());
            }
        })
    }

    async fn add_binding_redirects(&self) -> Result<()> {
        self.update(|state| {
            let mut names: Vec<String> = state.references.iter().map(|r| r.name.clone()).collect();
            names.sort_by_key(|n| n.to_ascii_lowercase());
            state.binding_redirects = names;
        })
    }

    #[tracing::instrument(skip(self))]
    async fn add_import(&self, path: &Path, location: ImportLocation) -> Result<()> {
        self.update(|state| {
            if state.imports.iter().any(|i| i.path == path) {
                return;
            }
            let import = ProjectImport {
                path: path.to_path_buf(),
                location,
            };
            match location {
                ImportLocation::Top => {
                    let at = state
                        .imports
                        .iter()
                        .take_while(|i| i.location == ImportLocation::Top)
                        .count();
                    state.imports.insert(at, import);
                }
                ImportLocation::Bottom => state.imports.push(import),
            }
        })
    }

    #[tracing::instrument(skip(self))]
    async fn remove_import(&self, path: &Path) -> Result<()> {
        self.update(|state| state.imports.retain(|i| i.path != path))
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self.runtime.exists(&resolve_under(&self.root, path)?))
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        self.runtime.read_to_string(&resolve_under(&self.root, path)?)
    }

    #[tracing::instrument(skip(self, contents))]
    async fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        let full = resolve_under(&self.root, path)?;
        self.runtime.write_creating_dirs(&full, contents.as_bytes())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_file(&self, path: &str) -> Result<()> {
        let full = resolve_under(&self.root, path)?;
        if !self.runtime.exists(&full) {
            return Ok(());
        }
        self.runtime.remove_file(&full)?;
        self.prune_empty_dirs(&full)
    }

    #[tracing::instrument(skip(self, contents), fields(package = %contents.identity))]
    async fn execute_script(
        &self,
        install_root: &Path,
        script: &str,
        contents: &PackageContents,
        throw_on_failure: bool,
    ) -> Result<()> {
        let script_path = resolve_under(install_root, script)?;
        let tools_path = script_path.parent().unwrap_or(install_root).to_path_buf();

        let mut command = if script.to_ascii_lowercase().ends_with(".ps1") {
            let mut command = Command::new("pwsh");
            command.args(["-NoProfile", "-NonInteractive", "-File"]);
            command.arg(&script_path);
            command
        } else {
            let mut command = Command::new("sh");
            command.arg(&script_path);
            command
        };
        command
            .arg(install_root)
            .arg(&tools_path)
            .current_dir(&self.root)
            .env("PKGAPPLY_INSTALL_PATH", install_root)
            .env("PKGAPPLY_TOOLS_PATH", &tools_path)
            .env("PKGAPPLY_PACKAGE_ID", &contents.identity.id)
            .env("PKGAPPLY_PACKAGE_VERSION", contents.identity.version.to_string())
            .env("PKGAPPLY_PROJECT_DIR", &self.root)
            .env("PKGAPPLY_PROJECT_NAME", self.name());

        info!("Executing script {} for {}", script, contents.identity);
        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to start script {}", script_path.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("{}: {}", script, stdout.trim());
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = format!("{} exited with {}: {}", script, output.status, stderr.trim());
            if throw_on_failure {
                anyhow::bail!(message);
            }
            warn!("{}", message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageIdentity;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    fn make_project<'a>(runtime: &'a RealRuntime, root: &Path) -> DirectoryProject<'a, RealRuntime> {
        let project = DirectoryProject::new(runtime, root.to_path_buf());
        project.init("net45".parse().unwrap()).unwrap();
        project
    }

    #[tokio::test]
    async fn test_uninitialized_project_fails() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let project = DirectoryProject::new(&runtime, dir.path().to_path_buf());

        assert!(!project.is_initialized());
        let err = project.target_framework().await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn test_references_replace_by_name() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let project = make_project(&runtime, dir.path());

        // --- Execute ---
        project.add_reference("Web", Path::new("/feed/Web/1.0/lib/Web.dll")).await.unwrap();
        project.add_reference("web", Path::new("/feed/Web/2.0/lib/Web.dll")).await.unwrap();

        // --- Verify ---
        let state = project.load().unwrap();
        assert_eq!(state.references.len(), 1);
        assert_eq!(state.references[0].path, PathBuf::from("/feed/Web/2.0/lib/Web.dll"));
        assert!(project.reference_exists("WEB").await.unwrap());

        project.remove_reference("Web").await.unwrap();
        assert!(!project.reference_exists("Web").await.unwrap());
    }

    #[tokio::test]
    async fn test_imports_respect_location() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let project = make_project(&runtime, dir.path());

        project.add_import(Path::new("a.targets"), ImportLocation::Bottom).await.unwrap();
        project.add_import(Path::new("a.props"), ImportLocation::Top).await.unwrap();
        project.add_import(Path::new("b.props"), ImportLocation::Top).await.unwrap();
        project.add_import(Path::new("a.props"), ImportLocation::Top).await.unwrap();

        let paths: Vec<PathBuf> = project.load().unwrap().imports.into_iter().map(|i| i.path).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a.props"),
                PathBuf::from("b.props"),
                PathBuf::from("a.targets"),
            ]
        );

        project.remove_import(Path::new("a.props")).await.unwrap();
        assert_eq!(project.load().unwrap().imports.len(), 2);
    }

    #[tokio::test]
    async fn test_properties_with_fallbacks() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("MyApp");
        let runtime = RealRuntime;
        let project = make_project(&runtime, &root);
        project
            .update(|s| {
                s.properties.insert("Company".into(), "Contoso".into());
            })
            .unwrap();

        assert_eq!(project.property("company").await.unwrap().as_deref(), Some("Contoso"));
        assert_eq!(project.property("RootNamespace").await.unwrap().as_deref(), Some("MyApp"));
        assert_eq!(project.property("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_files_and_empty_dir_pruning() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let project = make_project(&runtime, dir.path());

        project.write_file("Views/Shared/_Layout.cshtml", "<html/>").await.unwrap();
        assert!(project.file_exists("Views/Shared/_Layout.cshtml").await.unwrap());
        assert_eq!(project.read_file("Views/Shared/_Layout.cshtml").await.unwrap(), "<html/>");

        project.remove_file("Views/Shared/_Layout.cshtml").await.unwrap();
        assert!(!dir.path().join("Views").exists());
        // Removing again is a no-op.
        project.remove_file("Views/Shared/_Layout.cshtml").await.unwrap();

        assert!(project.write_file("../escape.txt", "x").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_shell_script() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let project_root = dir.path().join("project");
        let project = make_project(&runtime, &project_root);
        let install_root = dir.path().join("feed/A/1.0.0");
        runtime
            .write_creating_dirs(
                &install_root.join("tools/install.sh"),
                b"echo \"$PKGAPPLY_PACKAGE_ID $PKGAPPLY_PACKAGE_VERSION\" > marker.txt\n",
            )
            .unwrap();
        runtime
            .write_creating_dirs(&install_root.join("tools/fail.sh"), b"exit 3\n")
            .unwrap();
        let contents = PackageContents::empty(PackageIdentity::parse("A", "1.0.0").unwrap());

        // --- Execute & Verify ---
        project
            .execute_script(&install_root, "tools/install.sh", &contents, true)
            .await
            .unwrap();
        let marker = std::fs::read_to_string(project_root.join("marker.txt")).unwrap();
        assert_eq!(marker.trim(), "A 1.0.0");

        assert!(
            project
                .execute_script(&install_root, "tools/fail.sh", &contents, true)
                .await
                .is_err()
        );
        project
            .execute_script(&install_root, "tools/fail.sh", &contents, false)
            .await
            .unwrap();
    }
}
