//! Source abstraction for package contents.
//!
//! The pipeline reads packages only through [`ContentProvider`]; where the
//! bytes come from (an extracted feed on disk, an archive, a test fixture) is
//! up to the implementation.

mod local;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::framework::TargetFramework;
use crate::package::{AssetGroup, PackageContents, PackageIdentity, VersionRange};

pub use local::LocalFeed;

/// File describing one package version inside a feed (`package.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<DescriptorDependency>,
    /// Frameworks the package supports. Empty means every framework.
    #[serde(default)]
    pub frameworks: Vec<TargetFramework>,
    #[serde(default)]
    pub framework_references: Vec<AssetGroup>,
}

/// A dependency as declared in a descriptor, optionally scoped to a framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorDependency {
    pub id: String,
    #[serde(default)]
    pub range: VersionRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<TargetFramework>,
}

/// Trait for reading package contents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Dependencies and asset groups of one package.
    async fn contents(&self, identity: &PackageIdentity) -> Result<PackageContents>;

    /// Text of one item (a path as listed in an asset group).
    async fn read_item(&self, identity: &PackageIdentity, item: &str) -> Result<String>;

    /// Directory the package is extracted to; scripts run relative to it.
    async fn install_path(&self, identity: &PackageIdentity) -> Result<PathBuf>;
}
