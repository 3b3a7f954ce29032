//! A feed of already-extracted packages on the local file system.
//!
//! Layout: `<root>/<id>/<version>/package.json` plus the asset folders
//! `lib/`, `ref/`, `content/`, `build/` and `tools/`. A sub-folder named after
//! a framework (`lib/net45/`) forms a framework-specific group; anything else
//! belongs to the wildcard group of its category.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::{ContentProvider, PackageDescriptor};
use crate::framework::TargetFramework;
use crate::package::{
    AssetCategory, AssetGroup, PackageContents, PackageDependency, PackageDependencyInfo,
    PackageIdentity, parse_version,
};
use crate::resolver::MetadataProvider;
use crate::runtime::{Runtime, resolve_under, to_item_path};

const DESCRIPTOR_FILE: &str = "package.json";

pub struct LocalFeed<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
    framework: Option<TargetFramework>,
}

impl<'a, R: Runtime> LocalFeed<'a, R> {
    pub fn new(runtime: &'a R, root: PathBuf) -> Self {
        Self {
            runtime,
            root,
            framework: None,
        }
    }

    /// Report only the framework-specific dependencies nearest to `framework`.
    pub fn with_framework(mut self, framework: TargetFramework) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every version of `id`, matched case-insensitively.
    fn id_dir(&self, id: &str) -> Result<Option<PathBuf>> {
        if !self.runtime.is_dir(&self.root) {
            anyhow::bail!("Feed directory {} does not exist", self.root.display());
        }
        Ok(self
            .runtime
            .read_dir(&self.root)?
            .into_iter()
            .filter(|p| self.runtime.is_dir(p))
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case(id))
            }))
    }

    /// Version directories of `id` that carry a descriptor.
    fn version_dirs(&self, id: &str) -> Result<Vec<PathBuf>> {
        let Some(id_dir) = self.id_dir(id)? else {
            return Ok(Vec::new());
        };
        let mut dirs: Vec<PathBuf> = self
            .runtime
            .read_dir(&id_dir)?
            .into_iter()
            .filter(|p| self.runtime.exists(&p.join(DESCRIPTOR_FILE)))
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn load_descriptor(&self, dir: &Path) -> Result<PackageDescriptor> {
        let path = dir.join(DESCRIPTOR_FILE);
        let text = self.runtime.read_to_string(&path)?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn package_dir(&self, identity: &PackageIdentity) -> Result<PathBuf> {
        for dir in self.version_dirs(&identity.id)? {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if parse_version(name).is_ok_and(|v| v == identity.version) {
                return Ok(dir);
            }
        }
        anyhow::bail!("Package {} was not found in {}", identity, self.root.display())
    }

    /// Dependencies that apply to the configured framework.
    fn applicable_dependencies(&self, descriptor: &PackageDescriptor) -> Vec<PackageDependency> {
        let nearest = self.framework.and_then(|target| {
            descriptor
                .dependencies
                .iter()
                .filter_map(|d| d.framework)
                .filter_map(|fw| target.distance_to(&fw).map(|distance| (distance, fw)))
                .min_by_key(|(distance, _)| *distance)
                .map(|(_, fw)| fw)
        });

        descriptor
            .dependencies
            .iter()
            .filter(|d| match (d.framework, self.framework) {
                (None, _) => true,
                (Some(_), None) => true,
                (Some(fw), Some(_)) => nearest == Some(fw),
            })
            .map(|d| PackageDependency::new(d.id.clone(), d.range.clone()))
            .collect()
    }

    fn scan_category(&self, package_dir: &Path, folder: &str) -> Result<Vec<AssetGroup>> {
        let base = package_dir.join(folder);
        if !self.runtime.is_dir(&base) {
            return Ok(Vec::new());
        }

        let mut entries = self.runtime.read_dir(&base)?;
        entries.sort();

        let mut groups = Vec::new();
        let mut wildcard = Vec::new();
        for entry in entries {
            let name = entry
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            if self.runtime.is_dir(&entry) {
                let files = self.item_paths(package_dir, &self.runtime.walk_files(&entry)?)?;
                match name.parse::<TargetFramework>() {
                    Ok(framework) if !framework.is_any() => groups.push(AssetGroup::new(framework, files)),
                    _ => wildcard.extend(files),
                }
            } else {
                wildcard.extend(self.item_paths(package_dir, &[entry])?);
            }
        }

        if !wildcard.is_empty() {
            groups.push(AssetGroup::new(TargetFramework::ANY, wildcard));
        }
        Ok(groups)
    }

    fn item_paths(&self, package_dir: &Path, files: &[PathBuf]) -> Result<Vec<String>> {
        files
            .iter()
            .map(|f| Ok(to_item_path(f.strip_prefix(package_dir)?)))
            .collect()
    }
}

fn category_folder(category: AssetCategory) -> Option<&'static str> {
    match category {
        AssetCategory::Lib => Some("lib"),
        AssetCategory::Reference => Some("ref"),
        AssetCategory::Content => Some("content"),
        AssetCategory::Build => Some("build"),
        AssetCategory::Tool => Some("tools"),
        AssetCategory::FrameworkReference => None,
    }
}

#[async_trait]
impl<R: Runtime> MetadataProvider for LocalFeed<'_, R> {
    #[tracing::instrument(skip(self))]
    async fn dependency_infos(&self, id: &str) -> Result<Vec<PackageDependencyInfo>> {
        let mut infos = Vec::new();
        for dir in self.version_dirs(id)? {
            let loaded = self.load_descriptor(&dir).and_then(|descriptor| {
                let identity = PackageIdentity::parse(&descriptor.id, &descriptor.version)
                    .with_context(|| format!("Invalid package identity in {}", dir.display()))?;
                Ok((descriptor, identity))
            });
            let (descriptor, identity) = match loaded {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!("Skipping {}: {:#}", dir.display(), e);
                    continue;
                }
            };
            let dependencies = self.applicable_dependencies(&descriptor);
            infos.push(
                PackageDependencyInfo::new(identity, dependencies)
                    .with_frameworks(descriptor.frameworks.clone()),
            );
        }
        infos.sort_by(|a, b| a.identity.cmp(&b.identity));
        debug!("Feed has {} version(s) of {}", infos.len(), id);
        Ok(infos)
    }
}

#[async_trait]
impl<R: Runtime> ContentProvider for LocalFeed<'_, R> {
    #[tracing::instrument(skip(self), fields(package = %identity))]
    async fn contents(&self, identity: &PackageIdentity) -> Result<PackageContents> {
        let dir = self.package_dir(identity)?;
        let descriptor = self.load_descriptor(&dir)?;

        let mut contents = PackageContents::empty(identity.clone());
        contents.dependencies = self.applicable_dependencies(&descriptor);
        for category in AssetCategory::ALL {
            if let Some(folder) = category_folder(category) {
                *contents.groups_mut(category) = self.scan_category(&dir, folder)?;
            }
        }
        contents.framework_reference = descriptor.framework_references;
        Ok(contents)
    }

    async fn read_item(&self, identity: &PackageIdentity, item: &str) -> Result<String> {
        let dir = self.package_dir(identity)?;
        let path = resolve_under(&dir, item)?;
        self.runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read '{}' from {}", item, identity))
    }

    async fn install_path(&self, identity: &PackageIdentity) -> Result<PathBuf> {
        self.package_dir(identity)
    }
}
