//! The persisted list of packages installed into a project.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::framework::TargetFramework;
use crate::package::PackageIdentity;
use crate::runtime::Runtime;

pub const MANIFEST_FILE: &str = "packages.json";

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageReference {
    #[serde(flatten)]
    pub identity: PackageIdentity,
    pub target_framework: TargetFramework,
    /// False for entries listed but not yet applied to the project (for
    /// example a hand-edited manifest awaiting restore).
    #[serde(default = "default_installed")]
    pub installed: bool,
}

fn default_installed() -> bool {
    true
}

impl PackageReference {
    pub fn new(identity: PackageIdentity, target_framework: TargetFramework) -> Self {
        Self {
            identity,
            target_framework,
            installed: true,
        }
    }
}

/// Ordered entries with at most one entry per package id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    packages: Vec<PackageReference>,
}

impl PackageManifest {
    pub fn get(&self, id: &str) -> Option<&PackageReference> {
        self.packages.iter().find(|p| p.identity.has_id(id))
    }

    pub fn is_installed(&self, id: &str) -> bool {
        self.get(id).is_some_and(|p| p.installed)
    }

    /// Add `reference`, replacing any entry with the same id in place.
    pub fn add(&mut self, reference: PackageReference) {
        match self
            .packages
            .iter_mut()
            .find(|p| p.identity.has_id(&reference.identity.id))
        {
            Some(existing) => *existing = reference,
            None => self.packages.push(reference),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<PackageReference> {
        let index = self.packages.iter().position(|p| p.identity.has_id(id))?;
        Some(self.packages.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageReference> {
        self.packages.iter()
    }

    /// Identities of the installed entries, in manifest order.
    pub fn installed_identities(&self) -> Vec<PackageIdentity> {
        self.packages
            .iter()
            .filter(|p| p.installed)
            .map(|p| p.identity.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Loads and saves a [`PackageManifest`] as JSON.
pub struct ManifestStore<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> ManifestStore<'a, R> {
    pub fn new(runtime: &'a R, path: PathBuf) -> Self {
        Self { runtime, path }
    }

    /// Store at `<project_dir>/packages.json`.
    pub fn in_project(runtime: &'a R, project_dir: &Path) -> Self {
        Self::new(runtime, project_dir.join(MANIFEST_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest; a missing file is an empty manifest.
    pub fn load(&self) -> Result<PackageManifest> {
        if !self.runtime.exists(&self.path) {
            return Ok(PackageManifest::default());
        }
        let text = self.runtime.read_to_string(&self.path)?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest {:?}", self.path))
    }

    pub fn save(&self, manifest: &PackageManifest) -> Result<()> {
        let content = serde_json::to_string_pretty(manifest)?;
        self.runtime
            .write_creating_dirs(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to save manifest to {:?}", self.path))
    }

    #[tracing::instrument(skip(self), fields(package = %reference.identity))]
    pub fn record(&self, reference: PackageReference) -> Result<()> {
        let mut manifest = self.load()?;
        manifest.add(reference);
        self.save(&manifest)
    }

    /// Remove the entry for `id`; returns whether one existed.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut manifest = self.load()?;
        if manifest.remove(id).is_none() {
            debug!("{} is not in the manifest", id);
            return Ok(false);
        }
        self.save(&manifest)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::sync::{Arc, Mutex};

    fn reference(s: &str) -> PackageReference {
        PackageReference::new(s.parse().unwrap(), "net45".parse().unwrap())
    }

    #[test]
    fn test_add_keeps_ids_unique() {
        let mut manifest = PackageManifest::default();
        manifest.add(reference("A@1.0"));
        manifest.add(reference("B@1.0"));
        manifest.add(reference("a@2.0"));

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("A").unwrap().identity.version.major, 2);
        assert_eq!(manifest.iter().next().unwrap().identity.id, "a");
    }

    #[test]
    fn test_not_yet_installed_entries() {
        let json = r#"{"packages":[
            {"id":"A","version":"1.0.0","targetFramework":"net45"},
            {"id":"B","version":"1.0.0","targetFramework":"net45","installed":false}
        ]}"#;
        let manifest: PackageManifest = serde_json::from_str(json).unwrap();

        assert!(manifest.is_installed("a"));
        assert!(!manifest.is_installed("B"));
        assert_eq!(manifest.installed_identities().len(), 1);
    }

    #[test]
    fn test_serialized_form() {
        let mut manifest = PackageManifest::default();
        manifest.add(reference("A@1.0"));
        let value: serde_json::Value = serde_json::to_value(&manifest).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"packages":[
                {"id":"A","version":"1.0.0","targetFramework":"net45","installed":true}
            ]})
        );
    }

    #[test]
    fn test_store_missing_file_is_empty() {
        // --- Setup ---
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/project/packages.json")))
            .returning(|_| false);

        // --- Execute & Verify ---
        let store = ManifestStore::in_project(&runtime, Path::new("/project"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_store_record_and_remove() {
        // --- Setup ---
        let file: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let mut runtime = MockRuntime::new();
        {
            let file = file.clone();
            runtime
                .expect_exists()
                .returning(move |_| file.lock().unwrap().is_some());
        }
        {
            let file = file.clone();
            runtime
                .expect_read_to_string()
                .returning(move |_| Ok(file.lock().unwrap().clone().unwrap()));
        }
        {
            let file = file.clone();
            runtime
                .expect_write_creating_dirs()
                .returning(move |_, bytes| {
                    *file.lock().unwrap() = Some(String::from_utf8(bytes.to_vec()).unwrap());
                    Ok(())
                });
        }
        let store = ManifestStore::in_project(&runtime, Path::new("/project"));

        // --- Execute ---
        store.record(reference("A@1.0")).unwrap();
        store.record(reference("B@1.0")).unwrap();
        let removed = store.remove("a").unwrap();
        let removed_again = store.remove("a").unwrap();

        // --- Verify ---
        assert!(removed);
        assert!(!removed_again);
        let manifest = store.load().unwrap();
        assert_eq!(manifest.installed_identities(), vec!["B@1.0".parse().unwrap()]);
    }
}
