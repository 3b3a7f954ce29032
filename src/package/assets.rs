//! Framework-tagged asset groups extracted from a package.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{PackageDependency, PackageIdentity};
use crate::framework::TargetFramework;

/// Item name marking an intentionally empty framework folder.
pub const EMPTY_FOLDER_MARKER: &str = "_._";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    Lib,
    Reference,
    FrameworkReference,
    Content,
    Build,
    Tool,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 6] = [
        AssetCategory::Lib,
        AssetCategory::Reference,
        AssetCategory::FrameworkReference,
        AssetCategory::Content,
        AssetCategory::Build,
        AssetCategory::Tool,
    ];
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetCategory::Lib => "lib",
            AssetCategory::Reference => "reference",
            AssetCategory::FrameworkReference => "framework-reference",
            AssetCategory::Content => "content",
            AssetCategory::Build => "build",
            AssetCategory::Tool => "tool",
        };
        write!(f, "{}", name)
    }
}

/// A set of items of one category that apply to one framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub framework: TargetFramework,
    pub items: Vec<String>,
}

impl AssetGroup {
    pub fn new(framework: TargetFramework, items: Vec<String>) -> Self {
        Self { framework, items }
    }

    /// Items that should actually be applied (placeholders filtered out).
    pub fn applicable_items(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .map(String::as_str)
            .filter(|item| !is_empty_folder_marker(item))
    }

    pub fn has_empty_folder(&self) -> bool {
        self.items.iter().any(|item| is_empty_folder_marker(item))
    }

    /// A group counts as present content when it carries items, an explicit
    /// empty-folder marker, or is specific to a framework.
    pub fn is_valid(&self) -> bool {
        self.has_empty_folder() || !self.items.is_empty() || !self.framework.is_any()
    }
}

fn is_empty_folder_marker(item: &str) -> bool {
    Path::new(item)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == EMPTY_FOLDER_MARKER)
}

/// Everything the pipeline reads from one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageContents {
    pub identity: PackageIdentity,
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
    #[serde(default)]
    pub lib: Vec<AssetGroup>,
    #[serde(default)]
    pub reference: Vec<AssetGroup>,
    #[serde(default)]
    pub framework_reference: Vec<AssetGroup>,
    #[serde(default)]
    pub content: Vec<AssetGroup>,
    #[serde(default)]
    pub build: Vec<AssetGroup>,
    #[serde(default)]
    pub tool: Vec<AssetGroup>,
}

impl PackageContents {
    pub fn empty(identity: PackageIdentity) -> Self {
        Self {
            identity,
            dependencies: Vec::new(),
            lib: Vec::new(),
            reference: Vec::new(),
            framework_reference: Vec::new(),
            content: Vec::new(),
            build: Vec::new(),
            tool: Vec::new(),
        }
    }

    pub fn groups(&self, category: AssetCategory) -> &[AssetGroup] {
        match category {
            AssetCategory::Lib => &self.lib,
            AssetCategory::Reference => &self.reference,
            AssetCategory::FrameworkReference => &self.framework_reference,
            AssetCategory::Content => &self.content,
            AssetCategory::Build => &self.build,
            AssetCategory::Tool => &self.tool,
        }
    }

    pub fn groups_mut(&mut self, category: AssetCategory) -> &mut Vec<AssetGroup> {
        match category {
            AssetCategory::Lib => &mut self.lib,
            AssetCategory::Reference => &mut self.reference,
            AssetCategory::FrameworkReference => &mut self.framework_reference,
            AssetCategory::Content => &mut self.content,
            AssetCategory::Build => &mut self.build,
            AssetCategory::Tool => &mut self.tool,
        }
    }

    /// Whether the package carries anything that lands in a project.
    pub fn has_project_level_content(&self) -> bool {
        [
            AssetCategory::Lib,
            AssetCategory::FrameworkReference,
            AssetCategory::Content,
            AssetCategory::Build,
        ]
        .iter()
        .any(|c| !self.groups(*c).is_empty())
    }
}
