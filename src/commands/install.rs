use anyhow::Result;
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    events::PackageObserver,
    pipeline::{PackageOperation, PackagePipeline, PipelineOutcome},
    resolver::plan_actions,
    runtime::Runtime,
};

use super::config::Config;
use super::parse_requests;
use super::resolve::resolve_requests;

/// Resolve `packages` together with what is installed and apply the
/// difference to the project.
#[tracing::instrument(skip(config, observer, cancel))]
pub async fn install<R: Runtime>(
    config: &Config<R>,
    packages: &[String],
    observer: Arc<dyn PackageObserver>,
    cancel: CancellationToken,
) -> Result<()> {
    let requests = parse_requests(packages)?;
    config.ensure_project()?;
    let project = config.project();
    let framework = project.load()?.framework;
    let feed = config.feed(framework);
    let store = config.manifest();
    let installed = store.load()?.installed_identities();

    println!("   resolving {}", packages.join(", "));
    let resolution = resolve_requests(&feed, framework, config.behavior, &requests, &installed, cancel.clone()).await?;
    let actions = plan_actions(&installed, &resolution);
    if actions.is_empty() {
        println!("   nothing to do");
        return Ok(());
    }
    info!("Planned {} action(s)", actions.len());

    let pipeline = PackagePipeline::new(&project, &feed, store, config.options)
        .with_observer(observer)
        .with_cancellation(cancel);
    let outcomes = PackageOperation::new(&pipeline).execute(&actions).await?;
    for (action, outcome) in outcomes {
        match outcome {
            PipelineOutcome::Applied => println!("   {}", action),
            PipelineOutcome::NoOp => println!("   {} (already done)", action),
        }
    }
    Ok(())
}
