//! Version ranges with inclusive/exclusive bounds.

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::identity::parse_version;
use crate::error::{PackageError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// An interval over versions. A missing bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionRange {
    pub min: Option<Bound>,
    pub max: Option<Bound>,
}

impl VersionRange {
    /// The range satisfied by every version.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(Bound {
                version: version.clone(),
                inclusive: true,
            }),
            max: Some(Bound {
                version,
                inclusive: true,
            }),
        }
    }

    pub fn at_least(version: Version) -> Self {
        Self {
            min: Some(Bound {
                version,
                inclusive: true,
            }),
            max: None,
        }
    }

    pub fn below(version: Version) -> Self {
        Self {
            min: None,
            max: Some(Bound {
                version,
                inclusive: false,
            }),
        }
    }

    pub fn is_any(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        let above_min = match &self.min {
            Some(b) if b.inclusive => version >= &b.version,
            Some(b) => version > &b.version,
            None => true,
        };
        let below_max = match &self.max {
            Some(b) if b.inclusive => version <= &b.version,
            Some(b) => version < &b.version,
            None => true,
        };
        above_min && below_max
    }

    /// Narrow this range by another one. The result may be empty.
    pub fn intersect(&self, other: &VersionRange) -> VersionRange {
        VersionRange {
            min: tighter(&self.min, &other.min, true),
            max: tighter(&self.max, &other.max, false),
        }
    }

    fn parse_brackets(s: &str) -> Result<Self> {
        let invalid = || PackageError::invalid_argument(format!("invalid version range '{}'", s));
        let first = s.chars().next().ok_or_else(invalid)?;
        let last = s.chars().last().ok_or_else(invalid)?;
        if s.len() < 2 {
            return Err(invalid());
        }
        let min_inclusive = match first {
            '[' => true,
            '(' => false,
            _ => return Err(invalid()),
        };
        let max_inclusive = match last {
            ']' => true,
            ')' => false,
            _ => return Err(invalid()),
        };
        let inner = &s[1..s.len() - 1];

        match inner.split_once(',') {
            None => {
                // [1.0] is the only legal single-version bracket form.
                if !(min_inclusive && max_inclusive) || inner.trim().is_empty() {
                    return Err(invalid());
                }
                Ok(VersionRange::exact(parse_version(inner)?))
            }
            Some((lo, hi)) => {
                let min = match lo.trim() {
                    "" => None,
                    v => Some(Bound {
                        version: parse_version(v)?,
                        inclusive: min_inclusive,
                    }),
                };
                let max = match hi.trim() {
                    "" => None,
                    v => Some(Bound {
                        version: parse_version(v)?,
                        inclusive: max_inclusive,
                    }),
                };
                if min.is_none() && max.is_none() {
                    return Err(invalid());
                }
                Ok(VersionRange { min, max })
            }
        }
    }

    fn parse_comparators(s: &str) -> Result<Self> {
        let mut range = VersionRange::any();
        for term in s.split([',', ' ']).map(str::trim).filter(|t| !t.is_empty()) {
            let (op, version) = if let Some(v) = term.strip_prefix(">=") {
                (">=", v)
            } else if let Some(v) = term.strip_prefix("<=") {
                ("<=", v)
            } else if let Some(v) = term.strip_prefix('>') {
                (">", v)
            } else if let Some(v) = term.strip_prefix('<') {
                ("<", v)
            } else if let Some(v) = term.strip_prefix('=') {
                ("=", v)
            } else {
                (">=", term)
            };
            let version = parse_version(version)?;
            let constraint = match op {
                ">=" => VersionRange::at_least(version),
                ">" => VersionRange {
                    min: Some(Bound {
                        version,
                        inclusive: false,
                    }),
                    max: None,
                },
                "<=" => VersionRange {
                    min: None,
                    max: Some(Bound {
                        version,
                        inclusive: true,
                    }),
                },
                "<" => VersionRange::below(version),
                _ => VersionRange::exact(version),
            };
            range = range.intersect(&constraint);
        }
        Ok(range)
    }
}

fn tighter(a: &Option<Bound>, b: &Option<Bound>, lower: bool) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            let pick_x = match x.version.cmp(&y.version) {
                std::cmp::Ordering::Equal => !x.inclusive || y.inclusive,
                std::cmp::Ordering::Greater => lower,
                std::cmp::Ordering::Less => !lower,
            };
            Some(if pick_x { x.clone() } else { y.clone() })
        }
    }
}

impl FromStr for VersionRange {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(VersionRange::any());
        }
        if s.starts_with('[') || s.starts_with('(') {
            return Self::parse_brackets(s);
        }
        Self::parse_comparators(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (None, None) => write!(f, "*"),
            (Some(lo), Some(hi)) if lo.version == hi.version && lo.inclusive && hi.inclusive => {
                write!(f, "[{}]", lo.version)
            }
            (lo, hi) => {
                match lo {
                    Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
                    None => write!(f, "(")?,
                }
                write!(f, ", ")?;
                match hi {
                    Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
                    None => write!(f, ")"),
                }
            }
        }
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
