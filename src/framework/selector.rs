use super::TargetFramework;
use crate::package::AssetGroup;

/// Outcome of picking an asset group for a target framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    /// The package has no groups of this category; nothing to do.
    NoGroups,
    /// Groups exist but none suits the target framework.
    Incompatible,
    Selected(&'a AssetGroup),
}

impl<'a> Selection<'a> {
    pub fn group(&self) -> Option<&'a AssetGroup> {
        match self {
            Selection::Selected(group) => Some(group),
            _ => None,
        }
    }

    /// Selected and carrying content worth applying.
    pub fn is_valid(&self) -> bool {
        self.group().is_some_and(AssetGroup::is_valid)
    }
}

/// Pick the most specific group compatible with `target`.
///
/// Ties between equally distant groups go to the one declared first.
pub fn select_group<'a>(target: &TargetFramework, groups: &'a [AssetGroup]) -> Selection<'a> {
    if groups.is_empty() {
        return Selection::NoGroups;
    }

    groups
        .iter()
        .filter_map(|g| target.distance_to(&g.framework).map(|d| (d, g)))
        .min_by_key(|(distance, _)| *distance)
        .map_or(Selection::Incompatible, |(_, g)| Selection::Selected(g))
}
