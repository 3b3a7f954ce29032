//! Collecting the metadata universe from a provider.

use std::collections::{BTreeSet, VecDeque};

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use super::PackageRequest;
use crate::package::{PackageDependencyInfo, id_key};

/// Source of dependency metadata (a feed, a cache, a test fixture).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Every known version of `id`. An unknown id yields an empty list.
    async fn dependency_infos(&self, id: &str) -> Result<Vec<PackageDependencyInfo>>;
}

/// Walk the provider breadth-first from `requests`, following every declared
/// dependency of every version once.
#[tracing::instrument(skip(provider, requests))]
pub async fn gather<P: MetadataProvider + ?Sized>(
    provider: &P,
    requests: &[PackageRequest],
    extra_ids: &[String],
) -> Result<Vec<PackageDependencyInfo>> {
    let mut queue: VecDeque<String> = requests
        .iter()
        .map(|r| r.id.clone())
        .chain(extra_ids.iter().cloned())
        .collect();
    let mut seen = BTreeSet::new();
    let mut universe = Vec::new();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id_key(&id)) {
            continue;
        }
        let infos = provider.dependency_infos(&id).await?;
        debug!("Found {} version(s) of {}", infos.len(), id);
        for info in &infos {
            for dep in &info.dependencies {
                if !seen.contains(&id_key(&dep.id)) {
                    queue.push_back(dep.id.clone());
                }
            }
        }
        universe.extend(infos);
    }

    Ok(universe)
}
