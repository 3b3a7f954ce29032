//! Item paths: the `/`-separated relative paths a package uses to name
//! its files, and their mapping onto real directories.

use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};

/// Fold `.` and `..` out of `path` without touching the disk.
///
/// A leading `..` that has nothing to cancel is kept.
fn lexical(path: &Path) -> PathBuf {
    path.components().fold(PathBuf::new(), |mut out, component| {
        match component {
            Component::CurDir => {}
            Component::ParentDir if out.pop() => {}
            other => out.push(other),
        }
        out
    })
}

/// Whether `path`, once `..` is folded away, lies inside `dir`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    lexical(path).starts_with(lexical(dir))
}

/// Join a `/`- or `\`-separated item path onto `root`, refusing paths that
/// would land outside it.
pub fn resolve_under(root: &Path, item: &str) -> Result<PathBuf> {
    let relative: PathBuf = item.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    if relative.as_os_str().is_empty() || relative.is_absolute() {
        bail!("Invalid relative path '{}'", item);
    }
    let joined = lexical(&root.join(&relative));
    if !is_path_under(&joined, root) || joined == lexical(root) {
        bail!("Path '{}' escapes '{}'", item, root.display());
    }
    Ok(joined)
}

/// Render a relative path with `/` separators, as item paths are stored.
pub fn to_item_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
