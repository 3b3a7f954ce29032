use anyhow::Result;

use crate::resolver::PackageRequest;

pub mod config;
mod install;
mod list;
mod resolve;
mod uninstall;

pub use install::install;
pub use list::list;
pub use resolve::resolve;
pub use uninstall::uninstall;

/// Parse `id` / `id@range` arguments.
fn parse_requests(packages: &[String]) -> Result<Vec<PackageRequest>> {
    packages
        .iter()
        .map(|p| p.parse::<PackageRequest>().map_err(Into::into))
        .collect()
}
