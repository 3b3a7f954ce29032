//! Backtracking search over candidate versions.
//!
//! Each package id is a variable whose domain is the list of candidate
//! versions still allowed by the ranges placed on it so far. Choosing a version
//! immediately narrows the domains of the ids it depends on (forward
//! checking); an emptied domain is a conflict and the search backtracks.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;
use semver::Version;
use tokio_util::sync::CancellationToken;

use super::{DependencyBehavior, PackageRequest, Resolver};
use crate::error::{ConflictingRequirement, PackageError, Requirer, Result};
use crate::framework::TargetFramework;
use crate::package::{PackageDependencyInfo, PackageIdentity, VersionRange, id_key};

#[derive(Debug, Clone)]
struct Constraint {
    requirer: Requirer,
    range: VersionRange,
}

/// Why a branch of the search failed.
#[derive(Debug, Clone)]
struct Conflict {
    id: String,
    constraints: Vec<Constraint>,
    /// False when the constraints are jointly satisfiable and the failure only
    /// stems from earlier choices.
    genuine: bool,
}

enum Failure {
    Conflict(Conflict),
    Cancelled,
}

/// Immutable inputs of one resolve call.
pub(super) struct Problem<'a> {
    behavior: DependencyBehavior,
    /// Candidates per id key, ascending by version.
    candidates: BTreeMap<String, Vec<&'a PackageDependencyInfo>>,
    /// Display spelling per id key.
    display: BTreeMap<String, String>,
    targets: Vec<PackageRequest>,
    target_keys: BTreeSet<String>,
    installed: BTreeMap<String, Version>,
    /// Stand-ins for installed versions missing from the universe.
    synthetic: Vec<PackageDependencyInfo>,
}

/// Search state for one branch.
#[derive(Clone, Default)]
struct State {
    assigned: BTreeMap<String, usize>,
    constraints: BTreeMap<String, Vec<Constraint>>,
    /// Remaining candidate indices of constrained, unassigned ids.
    domains: BTreeMap<String, Vec<usize>>,
}

impl<'a> Problem<'a> {
    pub(super) fn new(
        resolver: &Resolver,
        targets: &[PackageRequest],
        universe: &'a [PackageDependencyInfo],
        installed: &[PackageIdentity],
    ) -> Self {
        let mut display = BTreeMap::new();
        for t in targets {
            display.insert(id_key(&t.id), t.id.clone());
        }
        let installed_map: BTreeMap<String, Version> = installed
            .iter()
            .map(|p| {
                display.entry(p.key()).or_insert_with(|| p.id.clone());
                (p.key(), p.version.clone())
            })
            .collect();

        let synthetic = installed
            .iter()
            .filter(|p| !universe.iter().any(|info| &info.identity == *p))
            .map(|p| PackageDependencyInfo::new(p.clone(), Vec::new()))
            .collect();

        Self {
            behavior: resolver.behavior,
            candidates: BTreeMap::new(),
            display,
            targets: targets.to_vec(),
            target_keys: targets.iter().map(|t| id_key(&t.id)).collect(),
            installed: installed_map,
            synthetic,
        }
        .with_candidates(universe, &resolver.framework)
    }

    /// Collect candidate domains for every id reachable from the targets and
    /// installed packages.
    fn with_candidates(
        mut self,
        universe: &'a [PackageDependencyInfo],
        framework: &TargetFramework,
    ) -> Self {
        let mut by_key: BTreeMap<String, Vec<&'a PackageDependencyInfo>> = BTreeMap::new();
        for info in universe {
            let key = info.identity.key();
            let is_installed = self.installed.get(&key) == Some(&info.identity.version);
            if is_installed || info.supports(framework) {
                by_key.entry(key).or_default().push(info);
            }
        }

        let mut queue: VecDeque<String> = self
            .target_keys
            .iter()
            .chain(self.installed.keys())
            .cloned()
            .collect();
        let mut visited = BTreeSet::new();

        while let Some(key) = queue.pop_front() {
            if !visited.insert(key.clone()) {
                continue;
            }
            let mut list = by_key.remove(&key).unwrap_or_default();
            list.sort_by(|a, b| a.identity.version.cmp(&b.identity.version));
            list.dedup_by(|a, b| a.identity.version == b.identity.version);

            if self.behavior != DependencyBehavior::Ignore {
                for info in &list {
                    for dep in &info.dependencies {
                        let dep_key = id_key(&dep.id);
                        self.display
                            .entry(dep_key.clone())
                            .or_insert_with(|| dep.id.clone());
                        if !visited.contains(&dep_key) {
                            queue.push_back(dep_key);
                        }
                    }
                }
            }
            self.candidates.insert(key, list);
        }
        self
    }

    /// Installed versions absent from the universe have to be added after
    /// construction because they borrow from `self`.
    fn candidate_list(&self, key: &str) -> Vec<&PackageDependencyInfo> {
        let mut list: Vec<&PackageDependencyInfo> = self
            .candidates
            .get(key)
            .map(|l| l.to_vec())
            .unwrap_or_default();
        for info in &self.synthetic {
            if info.identity.key() == key {
                list.push(info);
            }
        }
        list.sort_by(|a, b| a.identity.version.cmp(&b.identity.version));
        list
    }

    pub(super) fn solve<'p>(
        &'p self,
        cancel: Option<&CancellationToken>,
    ) -> Result<BTreeMap<String, &'p PackageDependencyInfo>> {
        let domains: BTreeMap<String, Vec<&'p PackageDependencyInfo>> = self
            .candidates
            .keys()
            .map(|k| (k.clone(), self.candidate_list(k)))
            .collect();
        let search = Search {
            problem: self,
            domains: &domains,
            cancel,
            first_conflict: None,
            first_genuine: None,
            steps: 0,
        };
        search.run()
    }

    fn display_id(&self, key: &str) -> String {
        self.display
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

struct Search<'s, 'p> {
    problem: &'p Problem<'p>,
    /// Full candidate lists per key, ascending.
    domains: &'s BTreeMap<String, Vec<&'p PackageDependencyInfo>>,
    cancel: Option<&'s CancellationToken>,
    first_conflict: Option<Conflict>,
    first_genuine: Option<Conflict>,
    steps: usize,
}

impl<'s, 'p> Search<'s, 'p> {
    fn run(mut self) -> Result<BTreeMap<String, &'p PackageDependencyInfo>> {
        let mut state = State::default();
        let mut initial = Ok(());
        for target in &self.problem.targets {
            let key = id_key(&target.id);
            initial = initial.and_then(|_| {
                self.constrain(&mut state, &key, Requirer::Target, target.range.clone())
            });
        }
        let installed: Vec<String> = self.problem.installed.keys().cloned().collect();
        for key in installed {
            initial = initial
                .and_then(|_| self.constrain(&mut state, &key, Requirer::Installed, VersionRange::any()));
        }

        let outcome = match initial {
            Ok(()) => self.search(state),
            Err(conflict) => Err(Failure::Conflict(conflict)),
        };

        match outcome {
            Ok(state) => {
                debug!("Resolved {} package(s) in {} step(s)", state.assigned.len(), self.steps);
                Ok(state
                    .assigned
                    .iter()
                    .map(|(key, idx)| (key.clone(), self.domains[key][*idx]))
                    .collect())
            }
            Err(Failure::Cancelled) => Err(PackageError::Cancelled),
            Err(Failure::Conflict(conflict)) => {
                self.record(conflict);
                let conflict = self
                    .first_genuine
                    .take()
                    .or_else(|| self.first_conflict.take());
                Err(self.report(conflict))
            }
        }
    }

    fn search(&mut self, state: State) -> std::result::Result<State, Failure> {
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(Failure::Cancelled);
        }
        self.steps += 1;

        // Most constrained variable first; BTreeMap order breaks ties.
        let Some(key) = state
            .domains
            .iter()
            .min_by_key(|(_, d)| d.len())
            .map(|(k, _)| k.clone())
        else {
            return Ok(state);
        };

        let order = self.preference_order(&key, &state.domains[&key]);
        let mut last = None;
        for idx in order {
            let mut next = state.clone();
            match self.assign(&mut next, &key, idx) {
                Ok(()) => match self.search(next) {
                    Ok(solved) => return Ok(solved),
                    Err(Failure::Cancelled) => return Err(Failure::Cancelled),
                    Err(Failure::Conflict(c)) => last = Some(c),
                },
                Err(c) => last = Some(c),
            }
            if let Some(c) = last.take() {
                self.record(c.clone());
                last = Some(c);
            }
        }

        Err(Failure::Conflict(last.unwrap_or_else(|| Conflict {
            id: key.clone(),
            constraints: state.constraints.get(&key).cloned().unwrap_or_default(),
            genuine: true,
        })))
    }

    fn record(&mut self, conflict: Conflict) {
        if conflict.genuine && self.first_genuine.is_none() {
            self.first_genuine = Some(conflict.clone());
        }
        if self.first_conflict.is_none() {
            self.first_conflict = Some(conflict);
        }
    }

    /// Choose candidate `idx` for `key` and propagate its dependency ranges.
    fn assign(&self, state: &mut State, key: &str, idx: usize) -> std::result::Result<(), Conflict> {
        state.domains.remove(key);
        state.assigned.insert(key.to_string(), idx);

        if self.problem.behavior == DependencyBehavior::Ignore {
            return Ok(());
        }

        let info = self.domains[key][idx];
        for dep in &info.dependencies {
            self.constrain(
                state,
                &id_key(&dep.id),
                Requirer::Package(info.identity.clone()),
                dep.range.clone(),
            )?;
        }
        Ok(())
    }

    /// Add a range on `key` and narrow its domain.
    fn constrain(
        &self,
        state: &mut State,
        key: &str,
        requirer: Requirer,
        range: VersionRange,
    ) -> std::result::Result<(), Conflict> {
        let candidates = self.domains.get(key).map(Vec::as_slice).unwrap_or_default();
        let constraints = state.constraints.entry(key.to_string()).or_default();
        constraints.push(Constraint { requirer, range });
        let constraints = constraints.clone();

        if let Some(&chosen) = state.assigned.get(key) {
            let version = &candidates[chosen].identity.version;
            if constraints.iter().all(|c| c.range.satisfies(version)) {
                return Ok(());
            }
            return Err(self.conflict(key, constraints));
        }

        let domain = state
            .domains
            .entry(key.to_string())
            .or_insert_with(|| (0..candidates.len()).collect());
        let newest = &constraints[constraints.len() - 1].range;
        domain.retain(|&i| newest.satisfies(&candidates[i].identity.version));
        if domain.is_empty() {
            return Err(self.conflict(key, constraints));
        }
        Ok(())
    }

    fn conflict(&self, key: &str, constraints: Vec<Constraint>) -> Conflict {
        let candidates = self.domains.get(key).map(Vec::as_slice).unwrap_or_default();
        let satisfiable = |set: &[Constraint]| {
            candidates
                .iter()
                .any(|c| set.iter().all(|k| k.range.satisfies(&c.identity.version)))
        };

        let genuine = !satisfiable(&constraints);
        if candidates.is_empty() || !genuine {
            return Conflict {
                id: self.problem.display_id(key),
                constraints,
                genuine,
            };
        }

        // Deletion filter: drop every constraint the conflict survives without.
        let mut minimal = constraints;
        let mut i = 0;
        while i < minimal.len() {
            let mut trial = minimal.clone();
            trial.remove(i);
            if satisfiable(&trial) {
                i += 1;
            } else {
                minimal = trial;
            }
        }

        Conflict {
            id: self.problem.display_id(key),
            constraints: minimal,
            genuine,
        }
    }

    fn report(&self, conflict: Option<Conflict>) -> PackageError {
        let Some(conflict) = conflict else {
            return PackageError::UnsatisfiableDependency {
                id: String::new(),
                requirers: Vec::new(),
            };
        };
        PackageError::UnsatisfiableDependency {
            id: conflict.id,
            requirers: conflict
                .constraints
                .into_iter()
                .map(|c| ConflictingRequirement {
                    requirer: c.requirer,
                    range: c.range.to_string(),
                })
                .collect(),
        }
    }

    /// Order the remaining candidates of `key` by preference.
    fn preference_order(&self, key: &str, domain: &[usize]) -> Vec<usize> {
        let candidates = &self.domains[key];
        let version = |i: usize| &candidates[i].identity.version;
        let installed = self
            .problem
            .installed
            .get(key)
            .and_then(|v| domain.iter().copied().find(|&i| version(i) == v));
        let is_target = self.problem.target_keys.contains(key);

        let mut order: Vec<usize> = domain.to_vec();
        match self.problem.behavior {
            DependencyBehavior::Lowest | DependencyBehavior::Ignore => {}
            DependencyBehavior::Highest => order.reverse(),
            DependencyBehavior::HighestPatch | DependencyBehavior::HighestMinor => {
                let Some(&lowest) = order.first() else {
                    return order;
                };
                let baseline = installed.map_or_else(|| version(lowest), version).clone();
                let patch_only = self.problem.behavior == DependencyBehavior::HighestPatch;
                let within = |v: &Version| {
                    v >= &baseline
                        && v.major == baseline.major
                        && (!patch_only || v.minor == baseline.minor)
                };
                let (mut bounded, rest): (Vec<usize>, Vec<usize>) =
                    order.into_iter().partition(|&i| within(version(i)));
                bounded.reverse();
                bounded.extend(rest);
                order = bounded;
            }
        }

        let keep_installed = !is_target
            || matches!(
                self.problem.behavior,
                DependencyBehavior::Lowest | DependencyBehavior::Highest | DependencyBehavior::Ignore
            );
        if let Some(idx) = installed.filter(|_| keep_installed) {
            order.retain(|&i| i != idx);
            order.insert(0, idx);
        }
        order
    }
}
