//! Package lifecycle scripts (`init`, `install`, `uninstall`) shipped in the
//! tool assets of a package.

use std::fmt;
use std::path::Path;

use log::debug;

use crate::error::{PackageError, Result};
use crate::package::{AssetGroup, PackageContents};
use crate::project::ProjectAdapter;
use crate::source::ContentProvider;

/// Script extensions, in lookup order.
const SCRIPT_EXTENSIONS: [&str; 2] = ["ps1", "sh"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Runs once per package per operation, from the framework-neutral tools.
    Init,
    Install,
    Uninstall,
}

impl HookKind {
    fn file_stem(&self) -> &'static str {
        match self {
            HookKind::Init => "init",
            HookKind::Install => "install",
            HookKind::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// The script for `kind`, if the package ships one.
///
/// `init` is only looked up in the wildcard tool group; `install` and
/// `uninstall` come from `selected`, the group picked for the project.
pub fn find_script<'a>(
    kind: HookKind,
    contents: &'a PackageContents,
    selected: Option<&'a AssetGroup>,
) -> Option<&'a str> {
    let group = match kind {
        HookKind::Init => contents.tool.iter().find(|g| g.framework.is_any()),
        HookKind::Install | HookKind::Uninstall => selected,
    }?;

    SCRIPT_EXTENSIONS.iter().find_map(|ext| {
        let wanted = format!("{}.{}", kind.file_stem(), ext);
        group.applicable_items().find(|item| {
            Path::new(item)
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(&wanted))
        })
    })
}

/// Runs lifecycle scripts of packages against one project.
pub struct ScriptHookRunner<'a> {
    project: &'a dyn ProjectAdapter,
    source: &'a dyn ContentProvider,
}

impl<'a> ScriptHookRunner<'a> {
    pub fn new(project: &'a dyn ProjectAdapter, source: &'a dyn ContentProvider) -> Self {
        Self { project, source }
    }

    /// Run the `kind` hook if present. Returns whether a script was found.
    ///
    /// With `throw_on_failure` a failing script is a
    /// [`PackageError::ScriptExecutionFailed`]; otherwise the project adapter
    /// only reports it.
    #[tracing::instrument(skip(self, contents, selected), fields(package = %contents.identity))]
    pub async fn run(
        &self,
        kind: HookKind,
        contents: &PackageContents,
        selected: Option<&AssetGroup>,
        throw_on_failure: bool,
    ) -> Result<bool> {
        let Some(script) = find_script(kind, contents, selected) else {
            debug!("{} has no {} script", contents.identity, kind);
            return Ok(false);
        };

        let failed = |source: anyhow::Error| PackageError::ScriptExecutionFailed {
            identity: contents.identity.clone(),
            script: script.to_string(),
            source,
        };

        let install_root = self
            .source
            .install_path(&contents.identity)
            .await
            .map_err(failed)?;
        self.project
            .execute_script(&install_root, script, contents, throw_on_failure)
            .await
            .map_err(failed)?;
        Ok(true)
    }
}
