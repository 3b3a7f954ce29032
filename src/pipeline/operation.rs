use std::collections::HashSet;

use log::info;

use super::{PackagePipeline, PipelineOutcome};
use crate::error::Result;
use crate::resolver::PackageAction;
use crate::runtime::Runtime;

/// A list of actions applied through one pipeline as a single operation.
///
/// A package's `init` hook runs at most once per operation, however many
/// times the package is installed during it.
pub struct PackageOperation<'p, 'a, R: Runtime> {
    pipeline: &'p PackagePipeline<'a, R>,
    initialized: HashSet<String>,
}

impl<'p, 'a, R: Runtime> PackageOperation<'p, 'a, R> {
    pub fn new(pipeline: &'p PackagePipeline<'a, R>) -> Self {
        Self {
            pipeline,
            initialized: HashSet::new(),
        }
    }

    /// Apply `actions` in order, stopping at the first error.
    #[tracing::instrument(skip(self, actions), fields(count = actions.len()))]
    pub async fn execute(&mut self, actions: &[PackageAction]) -> Result<Vec<(PackageAction, PipelineOutcome)>> {
        let mut outcomes = Vec::with_capacity(actions.len());
        for action in actions {
            info!("Executing {}", action);
            let outcome = match action {
                PackageAction::Install(identity) => {
                    self.pipeline
                        .install_package(identity, &mut self.initialized)
                        .await?
                }
                PackageAction::Uninstall(identity) => self.pipeline.uninstall_package(identity).await?,
            };
            outcomes.push((action.clone(), outcome));
        }
        Ok(outcomes)
    }
}
