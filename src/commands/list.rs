use anyhow::Result;
use log::debug;

use crate::runtime::Runtime;

use super::config::Config;

/// List the packages recorded in the project manifest.
#[tracing::instrument(skip(config))]
pub fn list<R: Runtime>(config: &Config<R>) -> Result<()> {
    let store = config.manifest();
    debug!("Listing packages from {:?}", store.path());

    let manifest = store.load()?;
    if manifest.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    for reference in manifest.iter() {
        let state = if reference.installed { "" } else { " (not installed)" };
        println!(
            "{} {} [{}]{}",
            reference.identity.id, reference.identity.version, reference.target_framework, state
        );
    }
    Ok(())
}
