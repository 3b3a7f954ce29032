//! Target frameworks and compatibility matching
//!
//! A project targets exactly one framework; packages tag their asset groups
//! with the frameworks they were built for. This module parses short folder
//! names (`net45`, `netstandard2.0`, `net6.0`, `any`), decides which
//! frameworks a project can consume, and picks the nearest asset group.

mod selector;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PackageError, Result};

pub use selector::{Selection, select_group};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameworkFamily {
    /// Wildcard: applies to every target, least specific.
    Any,
    NetFramework,
    NetStandard,
    NetCoreApp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FrameworkVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FrameworkVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    fn ordinal(&self) -> u64 {
        u64::from(self.major) * 1_000_000 + u64::from(self.minor) * 1_000 + u64::from(self.patch)
    }

    fn parse_dotted(s: &str) -> Option<Self> {
        let mut parts = s.split('.').map(|p| p.parse::<u32>().ok());
        let major = parts.next()??;
        let minor = parts.next().unwrap_or(Some(0))?;
        let patch = parts.next().unwrap_or(Some(0))?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// `45` -> 4.5, `472` -> 4.7.2: one digit per component.
    fn parse_compact(s: &str) -> Option<Self> {
        if s.is_empty() || s.len() > 3 || !s.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
        Some(Self::new(
            digits[0],
            digits.get(1).copied().unwrap_or(0),
            digits.get(2).copied().unwrap_or(0),
        ))
    }
}

/// Distance assigned to a netstandard group consumed by another family.
const CROSS_FAMILY_PENALTY: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetFramework {
    pub family: FrameworkFamily,
    pub version: FrameworkVersion,
}

impl TargetFramework {
    pub const ANY: TargetFramework = TargetFramework {
        family: FrameworkFamily::Any,
        version: FrameworkVersion::new(0, 0, 0),
    };

    pub fn new(family: FrameworkFamily, version: FrameworkVersion) -> Self {
        Self { family, version }
    }

    pub fn is_any(&self) -> bool {
        self.family == FrameworkFamily::Any
    }

    /// Whether a project targeting `self` can use assets built for `candidate`.
    pub fn is_compatible_with(&self, candidate: &TargetFramework) -> bool {
        self.distance_to(candidate).is_some()
    }

    /// How far `candidate` is from `self`; smaller is more specific.
    /// `None` when incompatible.
    pub fn distance_to(&self, candidate: &TargetFramework) -> Option<u64> {
        if candidate.is_any() {
            return Some(u64::MAX);
        }
        if self.family == candidate.family {
            return self
                .version
                .ordinal()
                .checked_sub(candidate.version.ordinal());
        }
        if candidate.family == FrameworkFamily::NetStandard {
            let supported = self.max_netstandard()?;
            return supported
                .ordinal()
                .checked_sub(candidate.version.ordinal())
                .map(|gap| CROSS_FAMILY_PENALTY + gap);
        }
        None
    }

    /// Highest netstandard version this framework implements.
    fn max_netstandard(&self) -> Option<FrameworkVersion> {
        let v = self.version;
        match self.family {
            FrameworkFamily::NetFramework => {
                let ns = if v >= FrameworkVersion::new(4, 6, 1) {
                    FrameworkVersion::new(2, 0, 0)
                } else if v >= FrameworkVersion::new(4, 6, 0) {
                    FrameworkVersion::new(1, 3, 0)
                } else if v >= FrameworkVersion::new(4, 5, 1) {
                    FrameworkVersion::new(1, 2, 0)
                } else if v >= FrameworkVersion::new(4, 5, 0) {
                    FrameworkVersion::new(1, 1, 0)
                } else {
                    return None;
                };
                Some(ns)
            }
            FrameworkFamily::NetCoreApp => Some(if v >= FrameworkVersion::new(3, 0, 0) {
                FrameworkVersion::new(2, 1, 0)
            } else if v >= FrameworkVersion::new(2, 0, 0) {
                FrameworkVersion::new(2, 0, 0)
            } else {
                FrameworkVersion::new(1, 6, 0)
            }),
            FrameworkFamily::NetStandard | FrameworkFamily::Any => None,
        }
    }

    /// Parse the long form `.NETFramework,Version=v4.5`.
    fn parse_long(s: &str) -> Option<Self> {
        let (identifier, version) = s.split_once(',')?;
        let version = version.trim().strip_prefix("Version=")?;
        let version = version.strip_prefix('v').unwrap_or(version);
        let version = FrameworkVersion::parse_dotted(version)?;
        let family = match identifier.trim().to_ascii_lowercase().as_str() {
            ".netframework" => FrameworkFamily::NetFramework,
            ".netstandard" => FrameworkFamily::NetStandard,
            ".netcoreapp" => FrameworkFamily::NetCoreApp,
            _ => return None,
        };
        Some(Self::new(family, version))
    }

    fn parse_short(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_prefix("netstandard") {
            let version = FrameworkVersion::parse_dotted(rest)
                .or_else(|| FrameworkVersion::parse_compact(rest))?;
            return Some(Self::new(FrameworkFamily::NetStandard, version));
        }
        if let Some(rest) = s.strip_prefix("netcoreapp") {
            let version = FrameworkVersion::parse_dotted(rest)
                .or_else(|| FrameworkVersion::parse_compact(rest))?;
            return Some(Self::new(FrameworkFamily::NetCoreApp, version));
        }
        let rest = s.strip_prefix("net")?;
        if rest.contains('.') {
            let version = FrameworkVersion::parse_dotted(rest)?;
            let family = if version.major >= 5 {
                FrameworkFamily::NetCoreApp
            } else {
                FrameworkFamily::NetFramework
            };
            return Some(Self::new(family, version));
        }
        let version = FrameworkVersion::parse_compact(rest)?;
        Some(Self::new(FrameworkFamily::NetFramework, version))
    }
}

impl FromStr for TargetFramework {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
            return Ok(TargetFramework::ANY);
        }
        let parsed = if trimmed.starts_with('.') {
            Self::parse_long(trimmed)
        } else {
            Self::parse_short(&trimmed.to_ascii_lowercase())
        };
        parsed.ok_or_else(|| {
            PackageError::invalid_argument(format!("unknown target framework '{}'", s))
        })
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.version;
        match self.family {
            FrameworkFamily::Any => write!(f, "any"),
            FrameworkFamily::NetFramework => {
                write!(f, "net{}{}", v.major, v.minor)?;
                if v.patch > 0 {
                    write!(f, "{}", v.patch)?;
                }
                Ok(())
            }
            FrameworkFamily::NetStandard => write!(f, "netstandard{}.{}", v.major, v.minor),
            FrameworkFamily::NetCoreApp if v.major >= 5 => write!(f, "net{}.{}", v.major, v.minor),
            FrameworkFamily::NetCoreApp => write!(f, "netcoreapp{}.{}", v.major, v.minor),
        }
    }
}

impl Serialize for TargetFramework {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TargetFramework {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
