use anyhow::{Result, bail};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    events::PackageObserver,
    pipeline::{PackageOperation, PackagePipeline, PipelineOutcome},
    resolver::{gather, plan_uninstall},
    runtime::Runtime,
};

use super::config::Config;

/// Uninstall `ids` (and, with `remove_dependencies`, the dependencies nothing
/// else needs) from the project.
#[tracing::instrument(skip(config, observer, cancel))]
pub async fn uninstall<R: Runtime>(
    config: &Config<R>,
    ids: &[String],
    remove_dependencies: bool,
    force: bool,
    observer: Arc<dyn PackageObserver>,
    cancel: CancellationToken,
) -> Result<()> {
    let project = config.project();
    if !project.is_initialized() {
        bail!("No project found in {}", config.project_dir.display());
    }
    let framework = project.load()?.framework;
    let feed = config.feed(framework);
    let store = config.manifest();
    let installed = store.load()?.installed_identities();

    let installed_ids: Vec<String> = installed.iter().map(|i| i.id.clone()).collect();
    let universe = gather(&feed, &[], &installed_ids).await?;
    let actions = plan_uninstall(&installed, &universe, ids, remove_dependencies, force)?;
    if actions.is_empty() {
        println!("   nothing to do");
        return Ok(());
    }

    let pipeline = PackagePipeline::new(&project, &feed, store, config.options)
        .with_observer(observer)
        .with_cancellation(cancel);
    let outcomes = PackageOperation::new(&pipeline).execute(&actions).await?;
    for (action, outcome) in outcomes {
        if outcome == PipelineOutcome::Applied {
            println!("   {}", action);
        }
    }
    Ok(())
}
