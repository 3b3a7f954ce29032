//! Package data model
//!
//! Identities, version ranges, dependency metadata and the framework-tagged
//! asset groups read from package contents.

mod assets;
mod dependency;
mod identity;
mod range;

pub use assets::{AssetCategory, AssetGroup, EMPTY_FOLDER_MARKER, PackageContents};
pub use dependency::{PackageDependency, PackageDependencyInfo};
pub use identity::{PackageIdentity, compare_ids, id_key, parse_version, validate_id};
pub use range::{Bound, VersionRange};
