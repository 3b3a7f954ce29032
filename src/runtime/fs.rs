//! `RealRuntime` file operations on top of `std::fs`.

use anyhow::{Context, Result};
use log::trace;
use std::fs;
use std::path::{Path, PathBuf};

use super::RealRuntime;

impl RealRuntime {
    /// Replace `path` through a sibling temporary file so a reader never
    /// sees a half-written project or manifest.
    #[tracing::instrument(skip(self, contents), fields(bytes = contents.len()))]
    pub(crate) fn write_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut staging = path.as_os_str().to_owned();
        staging.push(".partial");
        let staging = PathBuf::from(staging);
        fs::write(&staging, contents)
            .with_context(|| format!("Cannot write {}", staging.display()))?;
        if let Err(e) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(e).with_context(|| format!("Cannot replace {}", path.display()));
        }
        Ok(())
    }

    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        trace!("read {}", path.display());
        fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("Cannot create {}", path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("Cannot delete {}", path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_dir_impl(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path).with_context(|| format!("Cannot delete directory {}", path.display()))
    }

    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    pub(crate) fn is_dir_impl(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok_and(|m| m.is_dir())
    }

    pub(crate) fn read_dir_impl(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(path).with_context(|| format!("Cannot list {}", path.display()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Cannot list {}", path.display()))?;
            if entry.file_name().to_string_lossy().ends_with(".partial") {
                continue;
            }
            paths.push(entry.path());
        }
        Ok(paths)
    }
}
