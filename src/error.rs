//! Error taxonomy for resolution and installation.
//!
//! Collaborators (providers, project adapters, the runtime) report failures as
//! `anyhow::Error`; those surface through [`PackageError::Other`] with their
//! context intact. Everything the core itself decides has a dedicated variant.

use std::fmt;

use thiserror::Error;

use crate::package::PackageIdentity;

pub type Result<T, E = PackageError> = std::result::Result<T, E>;

/// Something that placed a version constraint on a package id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Requirer {
    /// The caller asked for the package directly.
    Target,
    /// The package is already installed and must stay installed.
    Installed,
    /// A selected package declares the dependency.
    Package(PackageIdentity),
}

impl fmt::Display for Requirer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirer::Target => write!(f, "(requested)"),
            Requirer::Installed => write!(f, "(installed)"),
            Requirer::Package(identity) => write!(f, "{}", identity),
        }
    }
}

/// One requirer together with the range it demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingRequirement {
    pub requirer: Requirer,
    pub range: String,
}

impl fmt::Display for ConflictingRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.requirer, self.range)
    }
}

fn join_requirements(requirements: &[ConflictingRequirement]) -> String {
    if requirements.is_empty() {
        return "no candidates available".to_string();
    }
    requirements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_identities(identities: &[PackageIdentity]) -> String {
    identities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Could not install package '{identity}'. The package does not contain any assemblies, content or tools compatible with '{framework}'"
    )]
    IncompatiblePackage {
        identity: PackageIdentity,
        framework: String,
    },

    #[error("Unable to resolve a version of '{id}': {}", join_requirements(.requirers))]
    UnsatisfiableDependency {
        id: String,
        requirers: Vec<ConflictingRequirement>,
    },

    #[error("Cannot uninstall '{identity}' because {} depend on it", join_identities(.dependents))]
    UninstallBlocked {
        identity: PackageIdentity,
        dependents: Vec<PackageIdentity>,
    },

    #[error("Script '{script}' of package '{identity}' failed")]
    ScriptExecutionFailed {
        identity: PackageIdentity,
        script: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PackageError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        PackageError::InvalidArgument(message.into())
    }

    /// Requirers named by a resolution conflict, empty for other errors.
    pub fn conflicting_requirers(&self) -> Vec<&Requirer> {
        match self {
            PackageError::UnsatisfiableDependency { requirers, .. } => {
                requirers.iter().map(|r| &r.requirer).collect()
            }
            _ => Vec::new(),
        }
    }
}
