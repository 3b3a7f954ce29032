//! Project abstraction.
//!
//! The pipeline drives a project only through the capabilities of
//! [`ProjectAdapter`]. [`DirectoryProject`] is the file-system backed
//! implementation used by the command line.

mod directory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::framework::TargetFramework;
use crate::package::PackageContents;

pub use directory::{DirectoryProject, PROJECT_FILE, ProjectState};

/// Where a build import is placed in the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportLocation {
    Top,
    Bottom,
}

impl fmt::Display for ImportLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportLocation::Top => write!(f, "top"),
            ImportLocation::Bottom => write!(f, "bottom"),
        }
    }
}

/// Switches that change what the pipeline asks of the project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    /// Never ask the project to regenerate binding redirects.
    pub binding_redirects_disabled: bool,
    /// Leave assembly references alone on install and uninstall.
    pub skip_assembly_references: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectAdapter: Send + Sync {
    /// Short display name.
    fn name(&self) -> String;

    /// Name that stays stable for the lifetime of the project.
    fn unique_name(&self) -> String;

    async fn target_framework(&self) -> Result<TargetFramework>;

    /// Value of a project property; names match case-insensitively.
    async fn property(&self, name: &str) -> Result<Option<String>>;

    // References
    async fn reference_exists(&self, name: &str) -> Result<bool>;
    async fn add_reference(&self, name: &str, path: &Path) -> Result<()>;
    async fn remove_reference(&self, name: &str) -> Result<()>;
    async fn add_framework_reference(&self, name: &str) -> Result<()>;
    async fn add_binding_redirects(&self) -> Result<()>;

    // Build imports
    async fn add_import(&self, path: &Path, location: ImportLocation) -> Result<()>;
    async fn remove_import(&self, path: &Path) -> Result<()>;

    // Project files, addressed by project-relative path
    async fn file_exists(&self, path: &str) -> Result<bool>;
    async fn read_file(&self, path: &str) -> Result<String>;
    async fn write_file(&self, path: &str, contents: &str) -> Result<()>;
    async fn remove_file(&self, path: &str) -> Result<()>;

    /// Run `script` (relative to `install_root`) against this project.
    ///
    /// When `throw_on_failure` is false a failing script is reported but the
    /// call still succeeds.
    async fn execute_script(
        &self,
        install_root: &Path,
        script: &str,
        contents: &PackageContents,
        throw_on_failure: bool,
    ) -> Result<()>;
}
