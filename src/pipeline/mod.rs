//! Per-package install and uninstall against one project.
//!
//! Each call walks a fixed sequence of stages. Nothing is rolled back: when a
//! stage fails, whatever the earlier stages changed stays changed, and the
//! manifest only records a package (or drops it) once every content step for
//! it has succeeded. Running the same call again finishes the job, because
//! every content step tolerates work that is already done.

mod items;
mod operation;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::error::{PackageError, Result};
use crate::events::{self, PackageEvent, PackageObserver};
use crate::framework::{Selection, TargetFramework, select_group};
use crate::manifest::{ManifestStore, PackageReference};
use crate::package::{AssetCategory, PackageContents, PackageIdentity, id_key};
use crate::project::{ProjectAdapter, ProjectOptions};
use crate::runtime::{Runtime, resolve_under};
use crate::script::{HookKind, ScriptHookRunner, find_script};
use crate::source::ContentProvider;
use crate::transform::{self, FileOutcome, content_order};

pub use operation::PackageOperation;

/// How a pipeline run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Applied,
    /// The project was already in the requested state; nothing changed.
    NoOp,
}

/// The group picked for the project's framework in every asset category.
struct SelectedAssets<'c> {
    lib: Selection<'c>,
    reference: Selection<'c>,
    framework_reference: Selection<'c>,
    content: Selection<'c>,
    build: Selection<'c>,
    tool: Selection<'c>,
}

impl<'c> SelectedAssets<'c> {
    fn select(contents: &'c PackageContents, framework: &TargetFramework) -> Self {
        let pick = |category| select_group(framework, contents.groups(category));
        Self {
            lib: pick(AssetCategory::Lib),
            reference: pick(AssetCategory::Reference),
            framework_reference: pick(AssetCategory::FrameworkReference),
            content: pick(AssetCategory::Content),
            build: pick(AssetCategory::Build),
            tool: pick(AssetCategory::Tool),
        }
    }

    fn has_project_level_content(&self) -> bool {
        self.lib.is_valid() || self.framework_reference.is_valid() || self.content.is_valid() || self.build.is_valid()
    }
}

pub struct PackagePipeline<'a, R: Runtime> {
    project: &'a dyn ProjectAdapter,
    source: &'a dyn ContentProvider,
    manifest: ManifestStore<'a, R>,
    options: ProjectOptions,
    observers: Vec<Arc<dyn PackageObserver>>,
    cancel: CancellationToken,
}

impl<'a, R: Runtime> PackagePipeline<'a, R> {
    pub fn new(
        project: &'a dyn ProjectAdapter,
        source: &'a dyn ContentProvider,
        manifest: ManifestStore<'a, R>,
        options: ProjectOptions,
    ) -> Self {
        Self {
            project,
            source,
            manifest,
            options,
            observers: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PackageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn manifest(&self) -> &ManifestStore<'a, R> {
        &self.manifest
    }

    /// Observers first, then the process-wide channel.
    fn emit(&self, event: PackageEvent) {
        for observer in &self.observers {
            observer.notify(&event);
        }
        events::publish(&event);
    }

    fn warn(&self, package: &PackageIdentity, message: String) {
        self.emit(PackageEvent::Warning {
            package: package.clone(),
            message,
        });
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(PackageError::Cancelled);
        }
        Ok(())
    }

    /// Install one package, running its `init` hook.
    pub async fn install(&self, identity: &PackageIdentity) -> Result<PipelineOutcome> {
        self.install_package(identity, &mut HashSet::new()).await
    }

    /// Uninstall one package.
    pub async fn uninstall(&self, identity: &PackageIdentity) -> Result<PipelineOutcome> {
        self.uninstall_package(identity).await
    }

    /// Install `identity`; its `init` hook only runs when its id is not yet
    /// in `initialized`.
    #[tracing::instrument(skip(self, initialized), fields(package = %identity))]
    async fn install_package(
        &self,
        identity: &PackageIdentity,
        initialized: &mut HashSet<String>,
    ) -> Result<PipelineOutcome> {
        self.check_cancelled()?;

        // PreCheck
        let manifest = self.manifest.load()?;
        if manifest.is_installed(&identity.id) {
            self.warn(identity, format!("'{}' already installed in project '{}'", identity, self.project.name()));
            return Ok(PipelineOutcome::NoOp);
        }

        // SelectContent
        let contents = self.source.contents(identity).await?;
        let framework = self.project.target_framework().await?;
        let selected = SelectedAssets::select(&contents, &framework);
        debug!("Selected assets of {} for {}", identity, framework);

        // ValidityGate
        let has_content = selected.has_project_level_content();
        let has_tools = [HookKind::Install, HookKind::Uninstall]
            .into_iter()
            .any(|kind| find_script(kind, &contents, selected.tool.group()).is_some())
            || find_script(HookKind::Init, &contents, None).is_some();
        if !has_content && (contents.has_project_level_content() || (!has_tools && contents.dependencies.is_empty()))
        {
            return Err(PackageError::IncompatiblePackage {
                identity: identity.clone(),
                framework: framework.to_string(),
            });
        }
        self.check_cancelled()?;

        self.emit(PackageEvent::Installing(identity.clone()));

        // ContentApply
        let install_root = self.source.install_path(identity).await?;
        self.add_references(identity, &install_root, &selected).await?;
        if let Some(group) = selected.framework_reference.group() {
            for name in group.applicable_items() {
                self.project.add_framework_reference(name).await?;
            }
        }
        self.apply_content(identity, &selected, true).await?;
        for (item, location) in items::build_imports(&identity.id, selected.build.group()) {
            let path = resolve_under(&install_root, item)?;
            self.project.add_import(&path, location).await?;
        }
        self.check_cancelled()?;

        // ManifestRecord
        self.manifest
            .record(PackageReference::new(identity.clone(), framework))
            .context("Failed to record package in manifest")?;
        info!("Added {} to {}", identity, self.project.name());

        self.emit(PackageEvent::Installed(identity.clone()));
        self.check_cancelled()?;

        // Scripts
        let runner = ScriptHookRunner::new(self.project, self.source);
        if initialized.insert(id_key(&identity.id)) {
            runner.run(HookKind::Init, &contents, None, true).await?;
        }
        runner
            .run(HookKind::Install, &contents, selected.tool.group(), true)
            .await?;

        Ok(PipelineOutcome::Applied)
    }

    #[tracing::instrument(skip(self), fields(package = %identity))]
    async fn uninstall_package(&self, identity: &PackageIdentity) -> Result<PipelineOutcome> {
        self.check_cancelled()?;

        // PreCheck; an entry still awaiting restore is removed like any other,
        // its content steps finding nothing to undo
        let manifest = self.manifest.load()?;
        let Some(reference) = manifest.get(&identity.id) else {
            self.warn(identity, format!("'{}' is not installed in project '{}'", identity, self.project.name()));
            return Ok(PipelineOutcome::NoOp);
        };

        // SelectContent, for the framework the package was installed against
        let contents = self.source.contents(identity).await?;
        let framework = reference.target_framework;
        let selected = SelectedAssets::select(&contents, &framework);
        self.check_cancelled()?;

        self.emit(PackageEvent::Uninstalling(identity.clone()));

        // Content removal, then the manifest entry
        let install_root = self.source.install_path(identity).await?;
        self.remove_references(identity, &selected).await?;
        if selected.framework_reference.group().is_some() {
            debug!("Framework references of {} are left in place", identity);
        }
        self.apply_content(identity, &selected, false).await?;
        for (item, _) in items::build_imports(&identity.id, selected.build.group()) {
            let path = resolve_under(&install_root, item)?;
            self.project.remove_import(&path).await?;
        }
        self.manifest
            .remove(&identity.id)
            .context("Failed to remove package from manifest")?;
        info!("Removed {} from {}", identity, self.project.name());

        self.emit(PackageEvent::Uninstalled(identity.clone()));
        self.check_cancelled()?;

        // Scripts; a failing uninstall hook does not fail the uninstall
        let runner = ScriptHookRunner::new(self.project, self.source);
        if let Err(e) = runner
            .run(HookKind::Uninstall, &contents, selected.tool.group(), false)
            .await
        {
            warn!("{:#}", anyhow::Error::from(e));
            self.warn(identity, format!("uninstall script of '{}' failed", identity));
        }

        Ok(PipelineOutcome::Applied)
    }

    async fn add_references(
        &self,
        identity: &PackageIdentity,
        install_root: &Path,
        selected: &SelectedAssets<'_>,
    ) -> Result<()> {
        if self.options.skip_assembly_references {
            debug!("Skipping assembly references of {}", identity);
            return Ok(());
        }

        let references = items::reference_items(selected.lib.group(), selected.reference.group());
        for item in &references {
            let name = items::reference_name(item);
            if self.project.reference_exists(name).await? {
                debug!("Replacing existing reference {}", name);
                self.project.remove_reference(name).await?;
            }
            let path = resolve_under(install_root, item)?;
            self.project.add_reference(name, &path).await?;
            self.emit(PackageEvent::ReferenceAdded {
                package: identity.clone(),
                reference: name.to_string(),
            });
        }

        if !references.is_empty() && !self.options.binding_redirects_disabled {
            self.project.add_binding_redirects().await?;
        }
        Ok(())
    }

    async fn remove_references(&self, identity: &PackageIdentity, selected: &SelectedAssets<'_>) -> Result<()> {
        if self.options.skip_assembly_references {
            debug!("Skipping assembly references of {}", identity);
            return Ok(());
        }

        for item in items::reference_items(selected.lib.group(), selected.reference.group()) {
            let name = items::reference_name(item);
            if !self.project.reference_exists(name).await? {
                continue;
            }
            self.project.remove_reference(name).await?;
            self.emit(PackageEvent::ReferenceRemoved {
                package: identity.clone(),
                reference: name.to_string(),
            });
        }
        Ok(())
    }

    /// Add (`install`) or remove the content files of the selected group.
    async fn apply_content(&self, identity: &PackageIdentity, selected: &SelectedAssets<'_>, install: bool) -> Result<()> {
        let Some(group) = selected.content.group() else {
            return Ok(());
        };

        let mut files: Vec<(String, &str)> = group
            .applicable_items()
            .filter_map(|item| items::content_path(group, item).map(|path| (path, item)))
            .collect();
        files.sort_by(|(a, _), (b, _)| content_order(a, b));

        for (path, item) in files {
            let text = self
                .source
                .read_item(identity, item)
                .await
                .with_context(|| format!("Failed to read content file '{}'", item))?;
            let outcome = if install {
                transform::install_file(self.project, &path, &text).await?
            } else {
                transform::uninstall_file(self.project, &path, &text).await?
            };
            if let FileOutcome::Skipped(message) = outcome {
                self.warn(identity, message);
            }
        }
        Ok(())
    }
}
