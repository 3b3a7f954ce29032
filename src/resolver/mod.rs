//! Dependency resolution
//!
//! This module handles:
//! - Gathering dependency metadata reachable from the requested packages
//! - Choosing exactly one version per package id so that every declared
//!   range is satisfied (backtracking search with forward checking)
//! - Ordering the chosen identities so dependencies come first
//! - Turning a resolution into install/uninstall actions

mod gather;
mod order;
mod plan;
mod search;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{PackageError, Result};
use crate::framework::TargetFramework;
use crate::package::{PackageDependencyInfo, PackageIdentity, VersionRange, validate_id};

pub use gather::{MetadataProvider, gather};
#[cfg(test)]
pub use gather::MockMetadataProvider;
pub use order::dependency_order;
pub use plan::{PackageAction, plan_actions, plan_uninstall};

/// Which satisfying version to prefer when several exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyBehavior {
    #[default]
    Lowest,
    HighestPatch,
    HighestMinor,
    Highest,
    /// Resolve the requested packages only; dependencies are not followed.
    Ignore,
}

impl fmt::Display for DependencyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DependencyBehavior::Lowest => "lowest",
            DependencyBehavior::HighestPatch => "highest-patch",
            DependencyBehavior::HighestMinor => "highest-minor",
            DependencyBehavior::Highest => "highest",
            DependencyBehavior::Ignore => "ignore",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for DependencyBehavior {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "lowest" => Ok(DependencyBehavior::Lowest),
            "highest-patch" | "highestpatch" => Ok(DependencyBehavior::HighestPatch),
            "highest-minor" | "highestminor" => Ok(DependencyBehavior::HighestMinor),
            "highest" => Ok(DependencyBehavior::Highest),
            "ignore" => Ok(DependencyBehavior::Ignore),
            _ => Err(PackageError::invalid_argument(format!(
                "unknown dependency behavior '{}'. Expected lowest, highest-patch, highest-minor, highest or ignore.",
                s
            ))),
        }
    }
}

/// A package the caller wants installed, constrained to a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub id: String,
    pub range: VersionRange,
}

impl PackageRequest {
    pub fn new(id: impl Into<String>, range: VersionRange) -> Result<Self> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self { id, range })
    }

    /// Request exactly this identity.
    pub fn exact(identity: &PackageIdentity) -> Self {
        Self {
            id: identity.id.clone(),
            range: VersionRange::exact(identity.version.clone()),
        }
    }
}

impl FromStr for PackageRequest {
    type Err = PackageError;

    /// Parse `id` or `id@range`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((id, range)) => PackageRequest::new(id, range.parse()?),
            None => PackageRequest::new(s, VersionRange::any()),
        }
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.range)
    }
}

/// Computes one consistent version per package id.
///
/// The resolver is pure: it reads the metadata it is given and nothing else.
#[derive(Debug, Clone)]
pub struct Resolver {
    behavior: DependencyBehavior,
    framework: TargetFramework,
    cancel: Option<CancellationToken>,
}

impl Resolver {
    pub fn new(behavior: DependencyBehavior, framework: TargetFramework) -> Self {
        Self {
            behavior,
            framework,
            cancel: None,
        }
    }

    /// Check `token` between backtracking steps.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn behavior(&self) -> DependencyBehavior {
        self.behavior
    }

    pub fn framework(&self) -> &TargetFramework {
        &self.framework
    }

    /// Resolve `targets` against `universe`, keeping `installed` packages
    /// installed.
    ///
    /// Returns every chosen identity (targets, their dependencies and the
    /// installed packages) ordered so that dependencies precede dependents.
    #[tracing::instrument(skip(self, universe, installed), fields(behavior = %self.behavior, framework = %self.framework))]
    pub fn resolve(
        &self,
        targets: &[PackageRequest],
        universe: &[PackageDependencyInfo],
        installed: &[PackageIdentity],
    ) -> Result<Vec<PackageIdentity>> {
        if targets.is_empty() && installed.is_empty() {
            return Ok(Vec::new());
        }

        let problem = search::Problem::new(self, targets, universe, installed);
        let assignment = problem.solve(self.cancel.as_ref())?;

        let chosen: Vec<&PackageDependencyInfo> = assignment.into_values().collect();
        let ignore_edges = self.behavior == DependencyBehavior::Ignore;
        Ok(dependency_order(&chosen, ignore_edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Requirer;
    use crate::package::{PackageDependency, parse_version};
    use std::collections::HashMap;

    fn info(id: &str, version: &str, deps: &[(&str, &str)]) -> PackageDependencyInfo {
        PackageDependencyInfo::new(
            PackageIdentity::parse(id, version).unwrap(),
            deps.iter()
                .map(|(d, r)| PackageDependency::new(*d, r.parse().unwrap()))
                .collect(),
        )
    }

    fn request(s: &str) -> PackageRequest {
        s.parse().unwrap()
    }

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::parse(id, version).unwrap()
    }

    fn resolver(behavior: DependencyBehavior) -> Resolver {
        Resolver::new(behavior, "net45".parse().unwrap())
    }

    fn versions_of(result: &[PackageIdentity]) -> HashMap<String, String> {
        result
            .iter()
            .map(|p| (p.id.clone(), p.version.to_string()))
            .collect()
    }

    /// Check the invariant every successful resolution must hold.
    fn assert_consistent(
        result: &[PackageIdentity],
        universe: &[PackageDependencyInfo],
        targets: &[PackageRequest],
    ) {
        let mut seen = std::collections::HashSet::new();
        for p in result {
            assert!(seen.insert(p.key()), "duplicate id {}", p.id);
        }
        for t in targets {
            let chosen = result.iter().find(|p| p.has_id(&t.id)).unwrap();
            assert!(t.range.satisfies(&chosen.version));
        }
        for p in result {
            let Some(meta) = universe.iter().find(|i| &i.identity == p) else {
                continue;
            };
            for dep in &meta.dependencies {
                let chosen = result.iter().find(|c| c.has_id(&dep.id)).unwrap();
                assert!(dep.range.satisfies(&chosen.version), "{} violates {}", chosen, dep.range);
            }
        }
    }

    #[test]
    fn test_behavior_parse_and_display() {
        for b in [
            DependencyBehavior::Lowest,
            DependencyBehavior::HighestPatch,
            DependencyBehavior::HighestMinor,
            DependencyBehavior::Highest,
            DependencyBehavior::Ignore,
        ] {
            assert_eq!(b.to_string().parse::<DependencyBehavior>().unwrap(), b);
        }
        assert_eq!(
            "HighestMinor".parse::<DependencyBehavior>().unwrap(),
            DependencyBehavior::HighestMinor
        );
        assert!("newest".parse::<DependencyBehavior>().is_err());
    }

    #[test]
    fn test_request_parse() {
        let r = request("A@[1.0,2.0)");
        assert_eq!(r.id, "A");
        assert!(r.range.satisfies(&parse_version("1.5").unwrap()));
        assert!(request("A").range.is_any());
        assert!("@1.0".parse::<PackageRequest>().is_err());
    }

    #[test]
    fn test_lowest_picks_minimum() {
        let universe = vec![
            info("A", "1.0.0", &[]),
            info("A", "1.2.0", &[]),
            info("A", "2.0.0", &[]),
        ];
        let targets = vec![request("A@>=1.0.0")];

        let result = resolver(DependencyBehavior::Lowest)
            .resolve(&targets, &universe, &[])
            .unwrap();
        assert_eq!(result, vec![identity("A", "1.0.0")]);
    }

    #[test]
    fn test_highest_picks_maximum() {
        let universe = vec![
            info("A", "1.0.0", &[]),
            info("A", "1.2.0", &[]),
            info("A", "2.0.0", &[]),
        ];
        let result = resolver(DependencyBehavior::Highest)
            .resolve(&[request("A@>=1.0.0")], &universe, &[])
            .unwrap();
        assert_eq!(result, vec![identity("A", "2.0.0")]);
    }

    #[test]
    fn test_transitive_dependencies_are_ordered_first() {
        let universe = vec![
            info("App", "1.0", &[("Lib", "[1.0,2.0)")]),
            info("Lib", "1.0", &[("Core", "1.1")]),
            info("Lib", "1.5", &[("Core", "1.2")]),
            info("Lib", "2.0", &[]),
            info("Core", "1.0", &[]),
            info("Core", "1.1", &[]),
            info("Core", "1.2", &[]),
        ];
        let targets = vec![request("App")];

        let result = resolver(DependencyBehavior::Lowest)
            .resolve(&targets, &universe, &[])
            .unwrap();
        assert_eq!(
            result,
            vec![identity("Core", "1.1"), identity("Lib", "1.0"), identity("App", "1.0")]
        );
        assert_consistent(&result, &universe, &targets);
    }

    #[test]
    fn test_conflict_names_both_requirers() {
        let universe = vec![
            info("A", "1.0.0", &[("X", ">=2.0.0")]),
            info("B", "1.0.0", &[("X", "<2.0.0")]),
            info("X", "1.0.0", &[]),
            info("X", "2.0.0", &[]),
        ];

        let err = resolver(DependencyBehavior::Lowest)
            .resolve(&[request("A"), request("B")], &universe, &[])
            .unwrap_err();

        match &err {
            PackageError::UnsatisfiableDependency { id, requirers } => {
                assert_eq!(id, "X");
                let names: Vec<_> = requirers.iter().map(|r| r.requirer.clone()).collect();
                assert_eq!(
                    names,
                    vec![
                        Requirer::Package(identity("A", "1.0.0")),
                        Requirer::Package(identity("B", "1.0.0")),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_backtracks_to_compatible_version() {
        // Highest A needs X 2.x which B forbids; A 1.0 works with X 1.x.
        let universe = vec![
            info("A", "1.0", &[("X", "[1.0,2.0)")]),
            info("A", "2.0", &[("X", "[2.0,3.0)")]),
            info("B", "1.0", &[("X", "(,2.0)")]),
            info("X", "1.0", &[]),
            info("X", "2.0", &[]),
        ];
        let targets = vec![request("A"), request("B")];

        let result = resolver(DependencyBehavior::Highest)
            .resolve(&targets, &universe, &[])
            .unwrap();
        let versions = versions_of(&result);
        assert_eq!(versions["A"], "1.0.0");
        assert_eq!(versions["X"], "1.0.0");
        assert_consistent(&result, &universe, &targets);
    }

    #[test]
    fn test_installed_version_is_kept_when_satisfying() {
        let universe = vec![
            info("App", "1.0", &[("Lib", "1.0")]),
            info("Lib", "1.0", &[]),
            info("Lib", "1.5", &[]),
            info("Lib", "2.0", &[]),
        ];
        let installed = vec![identity("Lib", "1.5")];

        for behavior in [DependencyBehavior::Lowest, DependencyBehavior::Highest] {
            let result = resolver(behavior)
                .resolve(&[request("App")], &universe, &installed)
                .unwrap();
            assert_eq!(versions_of(&result)["Lib"], "1.5.0", "{behavior}");
        }
    }

    #[test]
    fn test_installed_version_changes_when_forced() {
        let universe = vec![
            info("App", "1.0", &[("Lib", "2.0")]),
            info("Lib", "1.5", &[]),
            info("Lib", "2.0", &[]),
            info("Lib", "2.1", &[]),
        ];
        let installed = vec![identity("Lib", "1.5")];

        let result = resolver(DependencyBehavior::Lowest)
            .resolve(&[request("App")], &universe, &installed)
            .unwrap();
        assert_eq!(versions_of(&result)["Lib"], "2.0.0");
    }

    #[test]
    fn test_highest_patch_stays_within_minor() {
        let universe = vec![
            info("A", "1.2.3", &[]),
            info("A", "1.2.9", &[]),
            info("A", "1.3.0", &[]),
            info("A", "2.0.0", &[]),
        ];
        let installed = vec![identity("A", "1.2.3")];

        let result = resolver(DependencyBehavior::HighestPatch)
            .resolve(&[request("A")], &universe, &installed)
            .unwrap();
        assert_eq!(result, vec![identity("A", "1.2.9")]);
    }

    #[test]
    fn test_highest_minor_stays_within_major() {
        let universe = vec![
            info("A", "1.2.3", &[]),
            info("A", "1.2.9", &[]),
            info("A", "1.3.0", &[]),
            info("A", "2.0.0", &[]),
        ];
        let installed = vec![identity("A", "1.2.3")];

        let result = resolver(DependencyBehavior::HighestMinor)
            .resolve(&[request("A")], &universe, &installed)
            .unwrap();
        assert_eq!(result, vec![identity("A", "1.3.0")]);
    }

    #[test]
    fn test_highest_patch_without_baseline_uses_lowest_minor() {
        let universe = vec![
            info("App", "1.0", &[("Lib", "1.0")]),
            info("Lib", "1.0.0", &[]),
            info("Lib", "1.0.4", &[]),
            info("Lib", "1.1.0", &[]),
        ];

        let result = resolver(DependencyBehavior::HighestPatch)
            .resolve(&[request("App")], &universe, &[])
            .unwrap();
        assert_eq!(versions_of(&result)["Lib"], "1.0.4");
    }

    #[test]
    fn test_ignore_skips_dependencies() {
        let universe = vec![info("A", "1.0", &[("Missing", "1.0")])];

        let result = resolver(DependencyBehavior::Ignore)
            .resolve(&[request("A")], &universe, &[])
            .unwrap();
        assert_eq!(result, vec![identity("A", "1.0")]);
    }

    #[test]
    fn test_missing_dependency_is_reported() {
        let universe = vec![info("A", "1.0", &[("Missing", "1.0")])];

        let err = resolver(DependencyBehavior::Lowest)
            .resolve(&[request("A")], &universe, &[])
            .unwrap_err();
        match err {
            PackageError::UnsatisfiableDependency { id, requirers } => {
                assert_eq!(id, "Missing");
                assert_eq!(requirers.len(), 1);
                assert_eq!(requirers[0].requirer, Requirer::Package(identity("A", "1.0")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycles_terminate() {
        let universe = vec![
            info("A", "1.0", &[("B", "1.0")]),
            info("B", "1.0", &[("C", "1.0")]),
            info("C", "1.0", &[("A", "1.0")]),
        ];
        let targets = vec![request("A")];

        let result = resolver(DependencyBehavior::Lowest)
            .resolve(&targets, &universe, &[])
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_consistent(&result, &universe, &targets);
    }

    #[test]
    fn test_diamond_shares_one_version() {
        let universe = vec![
            info("Top", "1.0", &[("Left", "1.0"), ("Right", "1.0")]),
            info("Left", "1.0", &[("Base", "[1.0,3.0)")]),
            info("Right", "1.0", &[("Base", "[2.0,4.0)")]),
            info("Base", "1.0", &[]),
            info("Base", "2.0", &[]),
            info("Base", "3.0", &[]),
        ];
        let targets = vec![request("Top")];

        let result = resolver(DependencyBehavior::Lowest)
            .resolve(&targets, &universe, &[])
            .unwrap();
        assert_eq!(versions_of(&result)["Base"], "2.0.0");
        assert_eq!(result.first().unwrap().id, "Base");
        assert_eq!(result.last().unwrap().id, "Top");
        assert_consistent(&result, &universe, &targets);
    }

    #[test]
    fn test_framework_filters_candidates() {
        let universe = vec![
            info("A", "1.0", &[]),
            info("A", "2.0", &[]).with_frameworks(vec!["net472".parse().unwrap()]),
        ];

        let result = resolver(DependencyBehavior::Highest)
            .resolve(&[request("A")], &universe, &[])
            .unwrap();
        assert_eq!(result, vec![identity("A", "1.0")]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let universe = vec![
            info("A", "1.0", &[("C", "1.0")]),
            info("B", "1.0", &[("C", "1.0")]),
            info("C", "1.0", &[]),
            info("C", "1.1", &[]),
        ];
        let targets = vec![request("B"), request("A")];
        let first = resolver(DependencyBehavior::Highest)
            .resolve(&targets, &universe, &[])
            .unwrap();
        for _ in 0..5 {
            let again = resolver(DependencyBehavior::Highest)
                .resolve(&targets, &universe, &[])
                .unwrap();
            assert_eq!(first, again);
        }
        assert_eq!(
            first,
            vec![identity("C", "1.1"), identity("A", "1.0"), identity("B", "1.0")]
        );
    }

    #[test]
    fn test_cancelled_resolution() {
        let universe = vec![info("A", "1.0", &[])];
        let token = CancellationToken::new();
        token.cancel();

        let err = resolver(DependencyBehavior::Lowest)
            .with_cancellation(token)
            .resolve(&[request("A")], &universe, &[])
            .unwrap_err();
        assert!(matches!(err, PackageError::Cancelled));
    }

    #[test]
    fn test_empty_request_resolves_to_nothing() {
        let result = resolver(DependencyBehavior::Lowest)
            .resolve(&[], &[], &[])
            .unwrap();
        assert!(result.is_empty());
    }
}
