//! Dependency-first ordering of a resolved package set.

use std::collections::{BTreeMap, BTreeSet};

use crate::package::{PackageDependencyInfo, PackageIdentity, id_key};

/// Order `packages` so every package comes after the packages it depends on.
///
/// Ready packages are emitted in identity order. A cycle is broken by
/// emitting its smallest remaining member, so the result is deterministic
/// for any input.
pub fn dependency_order(packages: &[&PackageDependencyInfo], ignore_edges: bool) -> Vec<PackageIdentity> {
    let by_key: BTreeMap<String, &PackageDependencyInfo> = packages
        .iter()
        .map(|info| (info.identity.key(), *info))
        .collect();

    // key -> number of unemitted dependencies; dependency key -> dependents
    let mut pending: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    let mut dependents: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for (key, info) in &by_key {
        let deps: BTreeSet<String> = if ignore_edges {
            BTreeSet::new()
        } else {
            info.dependencies
                .iter()
                .map(|d| id_key(&d.id))
                .filter(|k| k != key && by_key.contains_key(k))
                .collect()
        };
        for dep in &deps {
            dependents.entry(dep.clone()).or_default().insert(key.as_str());
        }
        pending.insert(key.as_str(), deps);
    }

    let mut ready: BTreeSet<PackageIdentity> = pending
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(key, _)| by_key[*key].identity.clone())
        .collect();
    let mut ordered = Vec::with_capacity(by_key.len());

    while ordered.len() < by_key.len() {
        let next = match ready.pop_first() {
            Some(next) => next,
            // Only cycles remain: break at the smallest identity.
            None => match pending
                .keys()
                .map(|key| &by_key[*key].identity)
                .min()
                .cloned()
            {
                Some(next) => next,
                None => break,
            },
        };

        let key = next.key();
        pending.remove(key.as_str());
        if let Some(waiting) = dependents.get(&key) {
            for dependent in waiting {
                if let Some(deps) = pending.get_mut(dependent) {
                    deps.remove(&key);
                    if deps.is_empty() {
                        ready.insert(by_key[*dependent].identity.clone());
                    }
                }
            }
        }
        ready.remove(&next);
        ordered.push(next);
    }

    ordered
}
