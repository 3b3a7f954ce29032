//! File-system access for feeds, projects and manifests.
//!
//! Everything that touches disk goes through [`Runtime`], so the directory
//! project, the local feed and the manifest store can be exercised against
//! `MockRuntime` in tests. `path` holds the item-path helpers that keep
//! package items inside the directory they are installed into.

mod fs;
pub mod path;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use path::{is_path_under, resolve_under, to_item_path};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Replace the whole of `path` with `contents`.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Entries of `path` in no particular order.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Write `contents`, creating missing parent directories first.
    fn write_creating_dirs(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !self.exists(parent)
        {
            self.create_dir_all(parent)?;
        }
        self.write(path, contents)
    }

    /// Every file below `dir`, depth first, sorted by path within each directory.
    fn walk_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = self.read_dir(dir)?;
        entries.sort();
        let mut files = Vec::new();
        for entry in entries {
            if self.is_dir(&entry) {
                files.extend(self.walk_files(&entry)?);
            } else {
                files.push(entry);
            }
        }
        Ok(files)
    }
}

/// The runtime backed by the real file system.
pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        self.remove_dir_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }
}
