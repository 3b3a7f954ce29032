use anyhow::Result;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::{
    framework::TargetFramework,
    package::PackageIdentity,
    resolver::{DependencyBehavior, MetadataProvider, PackageRequest, Resolver, gather},
    runtime::Runtime,
};

use super::config::Config;
use super::parse_requests;

/// Gather what `requests` and the `installed` packages can reach and resolve
/// it, returning identities in install order.
#[tracing::instrument(skip(provider, requests, installed, cancel))]
pub(crate) async fn resolve_requests<P: MetadataProvider + ?Sized>(
    provider: &P,
    framework: TargetFramework,
    behavior: DependencyBehavior,
    requests: &[PackageRequest],
    installed: &[PackageIdentity],
    cancel: CancellationToken,
) -> Result<Vec<PackageIdentity>> {
    let installed_ids: Vec<String> = installed.iter().map(|i| i.id.clone()).collect();
    let universe = gather(provider, requests, &installed_ids).await?;
    debug!("Resolving against {} package version(s)", universe.len());

    let resolver = Resolver::new(behavior, framework).with_cancellation(cancel);
    Ok(resolver.resolve(requests, &universe, installed)?)
}

/// Print the identities `packages` resolve to, in install order.
#[tracing::instrument(skip(config, cancel))]
pub async fn resolve<R: Runtime>(config: &Config<R>, packages: &[String], cancel: CancellationToken) -> Result<()> {
    let requests = parse_requests(packages)?;
    let framework = config.target_framework()?;
    let installed = config.manifest().load()?.installed_identities();
    let feed = config.feed(framework);

    println!("   resolving {} for {}", packages.join(", "), framework);
    let resolution = resolve_requests(&feed, framework, config.behavior, &requests, &installed, cancel).await?;
    for identity in resolution {
        println!("{} {}", identity.id, identity.version);
    }
    Ok(())
}
