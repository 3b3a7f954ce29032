//! Mapping selected asset items onto project artifacts.

use crate::package::AssetGroup;
use crate::project::ImportLocation;

const ASSEMBLY_EXTENSIONS: [&str; 3] = ["dll", "exe", "winmd"];
const CONTENT_FOLDER: &str = "content/";

fn file_name(item: &str) -> &str {
    item.rsplit(['/', '\\']).next().unwrap_or(item)
}

fn extension(item: &str) -> Option<&str> {
    file_name(item).rsplit_once('.').map(|(_, ext)| ext)
}

/// Assembly name a reference item is registered under (its file stem).
pub(super) fn reference_name(item: &str) -> &str {
    let name = file_name(item);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// Lib items to reference. When a reference group was selected only lib
/// items whose file name it lists are kept.
pub(super) fn reference_items<'a>(lib: Option<&'a AssetGroup>, reference: Option<&AssetGroup>) -> Vec<&'a str> {
    let Some(lib) = lib else {
        return Vec::new();
    };
    lib.applicable_items()
        .filter(|item| {
            extension(item).is_some_and(|ext| ASSEMBLY_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        })
        .filter(|item| {
            reference.is_none_or(|group| {
                group
                    .applicable_items()
                    .any(|r| file_name(r).eq_ignore_ascii_case(file_name(item)))
            })
        })
        .collect()
}

/// Project-relative path of a content item: the `content/` folder and the
/// framework folder (`net45/`, or an explicit `any/`) are dropped.
pub(super) fn content_path(group: &AssetGroup, item: &str) -> Option<String> {
    let normalized = item.replace('\\', "/");
    let prefix = normalized.get(..CONTENT_FOLDER.len())?;
    if !prefix.eq_ignore_ascii_case(CONTENT_FOLDER) {
        return None;
    }
    let mut relative = &normalized[CONTENT_FOLDER.len()..];
    if !group.framework.is_any() {
        relative = relative.split_once('/').map(|(_, rest)| rest)?;
    } else if let Some((folder, rest)) = relative.split_once('/')
        && folder.eq_ignore_ascii_case("any")
    {
        relative = rest;
    }
    (!relative.is_empty()).then(|| relative.to_string())
}

/// `<id>.props` imports go to the top of the project, `<id>.targets` to the
/// bottom; other build items are not imported.
pub(super) fn build_imports<'a>(id: &str, build: Option<&'a AssetGroup>) -> Vec<(&'a str, ImportLocation)> {
    let Some(build) = build else {
        return Vec::new();
    };
    let props = format!("{}.props", id);
    let targets = format!("{}.targets", id);
    build
        .applicable_items()
        .filter_map(|item| {
            let name = file_name(item);
            if name.eq_ignore_ascii_case(&props) {
                Some((item, ImportLocation::Top))
            } else if name.eq_ignore_ascii_case(&targets) {
                Some((item, ImportLocation::Bottom))
            } else {
                None
            }
        })
        .collect()
}
