//! Dependency metadata as discovered from a feed.

use serde::{Deserialize, Serialize};

use super::{PackageIdentity, VersionRange};
use crate::framework::TargetFramework;

/// One declared dependency: an id and the versions it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub id: String,
    #[serde(default)]
    pub range: VersionRange,
}

impl PackageDependency {
    pub fn new(id: impl Into<String>, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
        }
    }
}

/// What the resolver knows about one package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDependencyInfo {
    pub identity: PackageIdentity,
    pub dependencies: Vec<PackageDependency>,
    /// Frameworks the package supports. Empty means every framework.
    pub frameworks: Vec<TargetFramework>,
}

impl PackageDependencyInfo {
    pub fn new(identity: PackageIdentity, dependencies: Vec<PackageDependency>) -> Self {
        Self {
            identity,
            dependencies,
            frameworks: Vec::new(),
        }
    }

    pub fn with_frameworks(mut self, frameworks: Vec<TargetFramework>) -> Self {
        self.frameworks = frameworks;
        self
    }

    /// Whether a project targeting `target` can consume this version.
    pub fn supports(&self, target: &TargetFramework) -> bool {
        self.frameworks.is_empty() || self.frameworks.iter().any(|fw| target.is_compatible_with(fw))
    }
}
