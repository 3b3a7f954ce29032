//! Package identities and lenient version parsing.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{PackageError, Result};

/// Parse a version string, accepting `1`, `1.2`, `1.2.3`, an optional leading
/// `v` and a prerelease/build suffix. Missing numeric components are zero.
pub fn parse_version(input: &str) -> Result<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(PackageError::invalid_argument("empty version"));
    }

    // Split off prerelease/build metadata before padding the numeric core.
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(PackageError::invalid_argument(format!(
            "invalid version '{}'",
            input
        )));
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded)
        .map_err(|e| PackageError::invalid_argument(format!("invalid version '{}': {}", input, e)))
}

/// A package id paired with one concrete version.
///
/// Ids compare ASCII case-insensitively; the original spelling is kept for
/// display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: Version,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: Version) -> Result<Self> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self { id, version })
    }

    pub fn parse(id: &str, version: &str) -> Result<Self> {
        Self::new(id, parse_version(version)?)
    }

    /// Lowercased id used for map keys.
    pub fn key(&self) -> String {
        id_key(&self.id)
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

/// Normalised map key for a package id.
pub fn id_key(id: &str) -> String {
    id.to_ascii_lowercase()
}

/// Reject ids that are empty or contain whitespace or path separators.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(PackageError::invalid_argument("package id must not be empty"));
    }
    if id
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '\\' || c == '@')
    {
        return Err(PackageError::invalid_argument(format!(
            "invalid package id '{}'",
            id
        )));
    }
    Ok(())
}

/// Compare two ids the way identities do.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.version.hash(state);
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_ids(&self.id, &other.id).then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

impl FromStr for PackageIdentity {
    type Err = PackageError;

    /// Parse `id@version`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((id, version)) => PackageIdentity::parse(id, version),
            None => Err(PackageError::invalid_argument(format!(
                "expected 'id@version', got '{}'",
                s
            ))),
        }
    }
}
