//! Turning resolutions into ordered install/uninstall actions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, warn};

use super::dependency_order;
use crate::error::{PackageError, Result};
use crate::package::{PackageDependencyInfo, PackageIdentity, id_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageAction {
    Install(PackageIdentity),
    Uninstall(PackageIdentity),
}

impl PackageAction {
    pub fn identity(&self) -> &PackageIdentity {
        match self {
            PackageAction::Install(identity) | PackageAction::Uninstall(identity) => identity,
        }
    }
}

impl fmt::Display for PackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageAction::Install(identity) => write!(f, "install {}", identity),
            PackageAction::Uninstall(identity) => write!(f, "uninstall {}", identity),
        }
    }
}

/// Diff the installed set against a resolution.
///
/// Uninstalls come first: packages the resolution drops, then packages whose
/// version changes in reverse resolution order. Installs follow in resolution
/// order.
pub fn plan_actions(installed: &[PackageIdentity], resolution: &[PackageIdentity]) -> Vec<PackageAction> {
    let resolved: BTreeMap<String, &PackageIdentity> =
        resolution.iter().map(|identity| (identity.key(), identity)).collect();
    let current: BTreeMap<String, &PackageIdentity> =
        installed.iter().map(|identity| (identity.key(), identity)).collect();

    let mut actions = Vec::new();

    for identity in installed.iter().rev() {
        if !resolved.contains_key(&identity.key()) {
            actions.push(PackageAction::Uninstall(identity.clone()));
        }
    }
    for identity in resolution.iter().rev() {
        if let Some(old) = current.get(&identity.key()) {
            if old.version != identity.version {
                actions.push(PackageAction::Uninstall((*old).clone()));
            }
        }
    }
    for identity in resolution {
        let unchanged = current
            .get(&identity.key())
            .is_some_and(|old| old.version == identity.version);
        if !unchanged {
            actions.push(PackageAction::Install(identity.clone()));
        }
    }

    debug!("Planned {} action(s)", actions.len());
    actions
}

/// Plan the removal of `ids` from the installed set.
///
/// With `remove_dependencies`, installed dependencies that nothing outside the
/// removal set still needs are removed too. Removing a package another
/// installed package depends on fails with [`PackageError::UninstallBlocked`]
/// unless `force` is set. Dependents are uninstalled before their
/// dependencies.
pub fn plan_uninstall(
    installed: &[PackageIdentity],
    universe: &[PackageDependencyInfo],
    ids: &[String],
    remove_dependencies: bool,
    force: bool,
) -> Result<Vec<PackageAction>> {
    let synthetic: Vec<PackageDependencyInfo> = installed
        .iter()
        .filter(|identity| !universe.iter().any(|info| &info.identity == *identity))
        .map(|identity| PackageDependencyInfo::new(identity.clone(), Vec::new()))
        .collect();
    let infos: BTreeMap<String, &PackageDependencyInfo> = installed
        .iter()
        .filter_map(|identity| {
            universe
                .iter()
                .chain(synthetic.iter())
                .find(|info| &info.identity == identity)
                .map(|info| (identity.key(), info))
        })
        .collect();

    let mut removing: BTreeSet<String> = BTreeSet::new();
    for id in ids {
        let key = id_key(id);
        if infos.contains_key(&key) {
            removing.insert(key);
        } else {
            warn!("Package '{}' is not installed", id);
        }
    }

    if remove_dependencies {
        loop {
            let mut added = false;
            let candidates: Vec<String> = removing
                .iter()
                .flat_map(|key| infos[key].dependencies.iter().map(|d| id_key(&d.id)))
                .filter(|key| infos.contains_key(key) && !removing.contains(key))
                .collect();
            for candidate in candidates {
                if dependents_outside(&infos, &removing, &candidate).is_empty() {
                    debug!("Also removing unused dependency {}", infos[&candidate].identity);
                    added |= removing.insert(candidate);
                }
            }
            if !added {
                break;
            }
        }
    }

    if !force {
        for key in &removing {
            let dependents = dependents_outside(&infos, &removing, key);
            if !dependents.is_empty() {
                return Err(PackageError::UninstallBlocked {
                    identity: infos[key].identity.clone(),
                    dependents,
                });
            }
        }
    }

    let selected: Vec<&PackageDependencyInfo> = removing.iter().map(|key| infos[key]).collect();
    Ok(dependency_order(&selected, false)
        .into_iter()
        .rev()
        .map(PackageAction::Uninstall)
        .collect())
}

/// Installed packages outside `removing` that depend on `key`.
fn dependents_outside(
    infos: &BTreeMap<String, &PackageDependencyInfo>,
    removing: &BTreeSet<String>,
    key: &str,
) -> Vec<PackageIdentity> {
    infos
        .iter()
        .filter(|(other, _)| !removing.contains(*other))
        .filter(|(_, info)| info.dependencies.iter().any(|d| id_key(&d.id) == key))
        .map(|(_, info)| info.identity.clone())
        .collect()
}
