//! Content file transforms
//!
//! This module handles:
//! - Recognising transform files by their extension pair
//! - Ordering a batch of content files so a file precedes its transforms
//! - Applying and reversing plain files, merges, templates and declarative
//!   transforms against a project

mod merge;
mod template;
mod xdt;
pub mod xml;

use anyhow::{Context, Result};
use log::debug;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::project::ProjectAdapter;

/// Which half of an install/uninstall pair is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformSide {
    Install,
    Uninstall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// XML fragment merged into the target (`.transform`).
    DirectMerge,
    /// `$token$` expansion into a new file (`.pp`).
    Templating,
    /// `xdt:Transform` documents, one per side (`.install.xdt` / `.uninstall.xdt`).
    DeclarativeTransform,
}

/// Suffixes that select a transform at install and at uninstall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformExtensionPair {
    pub install: &'static str,
    pub uninstall: &'static str,
}

impl TransformExtensionPair {
    pub fn suffix(&self, side: TransformSide) -> &'static str {
        match side {
            TransformSide::Install => self.install,
            TransformSide::Uninstall => self.uninstall,
        }
    }
}

const TRANSFORMS: [(TransformExtensionPair, TransformKind); 3] = [
    (
        TransformExtensionPair {
            install: ".transform",
            uninstall: ".transform",
        },
        TransformKind::DirectMerge,
    ),
    (
        TransformExtensionPair {
            install: ".pp",
            uninstall: ".pp",
        },
        TransformKind::Templating,
    ),
    (
        TransformExtensionPair {
            install: ".install.xdt",
            uninstall: ".uninstall.xdt",
        },
        TransformKind::DeclarativeTransform,
    ),
];

/// How one content file is treated on one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDisposition {
    /// Copied to (or removed from) the project as-is.
    Plain,
    /// Applied to `target`, the path with the transform suffix removed.
    Transform { kind: TransformKind, target: String },
    /// A transform file that belongs to the other side.
    Ignored,
}

/// Result of applying one content file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Applied,
    /// Nothing to do; the project is already in the wanted state.
    Unchanged,
    /// Deliberately left alone; the message says why.
    Skipped(String),
    Ignored,
}

fn strip_suffix_ignore_case<'a>(path: &'a str, suffix: &str) -> Option<&'a str> {
    let split = path.len().checked_sub(suffix.len())?;
    if !path.is_char_boundary(split) || !path[split..].eq_ignore_ascii_case(suffix) {
        return None;
    }
    Some(&path[..split]).filter(|target| !target.is_empty())
}

pub fn classify(path: &str, side: TransformSide) -> FileDisposition {
    for (pair, kind) in &TRANSFORMS {
        if let Some(target) = strip_suffix_ignore_case(path, pair.suffix(side)) {
            return FileDisposition::Transform {
                kind: *kind,
                target: target.to_string(),
            };
        }
    }
    let other = match side {
        TransformSide::Install => TransformSide::Uninstall,
        TransformSide::Uninstall => TransformSide::Install,
    };
    if TRANSFORMS
        .iter()
        .any(|(pair, _)| strip_suffix_ignore_case(path, pair.suffix(other)).is_some())
    {
        return FileDisposition::Ignored;
    }
    FileDisposition::Plain
}

/// Processing order for a batch of content files.
///
/// A path that is a case-insensitive prefix of another comes first;
/// otherwise paths sort in descending case-insensitive order.
pub fn content_order(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().flat_map(char::to_lowercase);
    let mut right = b.chars().flat_map(char::to_lowercase);
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) if x == y => continue,
            (Some(x), Some(y)) => return y.cmp(&x),
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

/// Apply the content file `path` (project-relative) with body `text`.
#[tracing::instrument(skip(project, text))]
pub async fn install_file(project: &dyn ProjectAdapter, path: &str, text: &str) -> Result<FileOutcome> {
    match classify(path, TransformSide::Install) {
        FileDisposition::Ignored => {
            debug!("Ignoring {} during install", path);
            Ok(FileOutcome::Ignored)
        }
        FileDisposition::Plain => {
            if project.file_exists(path).await? {
                debug!("'{}' already exists. Skipping...", path);
                return Ok(FileOutcome::Skipped(format!("'{}' already exists", path)));
            }
            project.write_file(path, text).await?;
            Ok(FileOutcome::Applied)
        }
        FileDisposition::Transform { kind, target } => match kind {
            TransformKind::DirectMerge => {
                let merged = if project.file_exists(&target).await? {
                    let existing = project.read_file(&target).await?;
                    merge::merge_documents(&existing, text)
                } else {
                    merge::new_document(text)
                }
                .with_context(|| format!("Failed to merge {} into {}", path, target))?;
                project.write_file(&target, &merged).await?;
                Ok(FileOutcome::Applied)
            }
            TransformKind::Templating => {
                if project.file_exists(&target).await? {
                    debug!("'{}' already exists. Skipping...", target);
                    return Ok(FileOutcome::Skipped(format!("'{}' already exists", target)));
                }
                let expanded = expand_template(project, text).await?;
                project.write_file(&target, &expanded).await?;
                Ok(FileOutcome::Applied)
            }
            TransformKind::DeclarativeTransform => apply_declarative(project, path, &target, text).await,
        },
    }
}

/// Reverse what [`install_file`] did for the same content file.
#[tracing::instrument(skip(project, text))]
pub async fn uninstall_file(project: &dyn ProjectAdapter, path: &str, text: &str) -> Result<FileOutcome> {
    match classify(path, TransformSide::Uninstall) {
        FileDisposition::Ignored => {
            debug!("Ignoring {} during uninstall", path);
            Ok(FileOutcome::Ignored)
        }
        FileDisposition::Plain => remove_if_unmodified(project, path, text).await,
        FileDisposition::Transform { kind, target } => match kind {
            TransformKind::DirectMerge => {
                if !project.file_exists(&target).await? {
                    return Ok(FileOutcome::Unchanged);
                }
                let existing = project.read_file(&target).await?;
                let reverted = merge::unmerge_documents(&existing, text)
                    .with_context(|| format!("Failed to remove {} from {}", path, target))?;
                project.write_file(&target, &reverted).await?;
                Ok(FileOutcome::Applied)
            }
            TransformKind::Templating => {
                let expanded = expand_template(project, text).await?;
                remove_if_unmodified(project, &target, &expanded).await
            }
            TransformKind::DeclarativeTransform => apply_declarative(project, path, &target, text).await,
        },
    }
}

async fn remove_if_unmodified(project: &dyn ProjectAdapter, path: &str, expected: &str) -> Result<FileOutcome> {
    if !project.file_exists(path).await? {
        return Ok(FileOutcome::Unchanged);
    }
    if project.read_file(path).await? != expected {
        debug!("'{}' has been modified. Skipping...", path);
        return Ok(FileOutcome::Skipped(format!("'{}' was modified and was not removed", path)));
    }
    project.remove_file(path).await?;
    Ok(FileOutcome::Applied)
}

async fn expand_template(project: &dyn ProjectAdapter, text: &str) -> Result<String> {
    let mut values = BTreeMap::new();
    for name in template::token_names(text) {
        if let Some(value) = project.property(&name).await? {
            values.insert(name, value);
        }
    }
    Ok(template::expand(text, &values))
}

async fn apply_declarative(
    project: &dyn ProjectAdapter,
    path: &str,
    target: &str,
    text: &str,
) -> Result<FileOutcome> {
    if !project.file_exists(target).await? {
        debug!("'{}' does not exist; {} was not applied", target, path);
        return Ok(FileOutcome::Skipped(format!(
            "'{}' does not exist; {} was not applied",
            target, path
        )));
    }
    let existing = project.read_file(target).await?;
    let transformed = xdt::transform_documents(&existing, text)
        .with_context(|| format!("Failed to apply {} to {}", path, target))?;
    project.write_file(target, &transformed).await?;
    Ok(FileOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::MockProjectAdapter;
    use mockall::predicate::eq;

    #[test]
    fn test_classify_by_extension_pair() {
        assert_eq!(classify("readme.txt", TransformSide::Install), FileDisposition::Plain);
        assert_eq!(
            classify("web.config.transform", TransformSide::Install),
            FileDisposition::Transform {
                kind: TransformKind::DirectMerge,
                target: "web.config".into()
            }
        );
        assert_eq!(
            classify("Models/Foo.cs.PP", TransformSide::Uninstall),
            FileDisposition::Transform {
                kind: TransformKind::Templating,
                target: "Models/Foo.cs".into()
            }
        );
        assert_eq!(
            classify("web.config.install.xdt", TransformSide::Install),
            FileDisposition::Transform {
                kind: TransformKind::DeclarativeTransform,
                target: "web.config".into()
            }
        );
        assert_eq!(
            classify("web.config.uninstall.xdt", TransformSide::Install),
            FileDisposition::Ignored
        );
        assert_eq!(
            classify("web.config.install.xdt", TransformSide::Uninstall),
            FileDisposition::Ignored
        );
        assert_eq!(classify(".pp", TransformSide::Install), FileDisposition::Plain);
    }

    #[test]
    fn test_content_order_puts_file_before_its_transforms() {
        let mut files = vec!["web.config.transform", "web.config.install.xdt", "web.config"];
        files.sort_by(|a, b| content_order(a, b));
        assert_eq!(files[0], "web.config");
        assert_eq!(
            files,
            vec!["web.config", "web.config.transform", "web.config.install.xdt"]
        );
    }

    #[test]
    fn test_content_order_is_descending_otherwise() {
        let mut files = vec!["a.txt", "C.txt", "b.txt", "Views/x.cshtml", "views"];
        files.sort_by(|a, b| content_order(a, b));
        assert_eq!(files, vec!["views", "Views/x.cshtml", "C.txt", "b.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn test_install_plain_file_skips_existing() {
        // --- Setup ---
        let mut project = MockProjectAdapter::new();
        project
            .expect_file_exists()
            .with(eq("readme.txt"))
            .returning(|_| Ok(true));
        project.expect_write_file().never();

        // --- Execute & Verify ---
        let outcome = install_file(&project, "readme.txt", "hello").await.unwrap();
        assert!(matches!(outcome, FileOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_install_plain_file_writes_new_file() {
        let mut project = MockProjectAdapter::new();
        project.expect_file_exists().returning(|_| Ok(false));
        project
            .expect_write_file()
            .with(eq("readme.txt"), eq("hello"))
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = install_file(&project, "readme.txt", "hello").await.unwrap();
        assert_eq!(outcome, FileOutcome::Applied);
    }

    #[tokio::test]
    async fn test_uninstall_plain_file_keeps_modified_copy() {
        let mut project = MockProjectAdapter::new();
        project.expect_file_exists().returning(|_| Ok(true));
        project
            .expect_read_file()
            .returning(|_| Ok("edited".to_string()));
        project.expect_remove_file().never();

        let outcome = uninstall_file(&project, "readme.txt", "hello").await.unwrap();
        assert!(matches!(outcome, FileOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_uninstall_missing_plain_file_is_a_no_op() {
        let mut project = MockProjectAdapter::new();
        project.expect_file_exists().returning(|_| Ok(false));

        let outcome = uninstall_file(&project, "readme.txt", "hello").await.unwrap();
        assert_eq!(outcome, FileOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_templating_expands_project_properties() {
        // --- Setup ---
        let mut project = MockProjectAdapter::new();
        project
            .expect_file_exists()
            .with(eq("Models/Foo.cs"))
            .returning(|_| Ok(false));
        project
            .expect_property()
            .with(eq("rootnamespace"))
            .returning(|_| Ok(Some("MyApp".to_string())));
        project
            .expect_write_file()
            .with(eq("Models/Foo.cs"), eq("namespace MyApp.Models {}"))
            .times(1)
            .returning(|_, _| Ok(()));

        // --- Execute & Verify ---
        let outcome = install_file(&project, "Models/Foo.cs.pp", "namespace $rootnamespace$.Models {}")
            .await
            .unwrap();
        assert_eq!(outcome, FileOutcome::Applied);
    }

    #[tokio::test]
    async fn test_templating_uninstall_removes_unmodified_output() {
        let mut project = MockProjectAdapter::new();
        project.expect_file_exists().returning(|_| Ok(true));
        project
            .expect_property()
            .returning(|_| Ok(Some("MyApp".to_string())));
        project
            .expect_read_file()
            .returning(|_| Ok("namespace MyApp.Models {}".to_string()));
        project
            .expect_remove_file()
            .with(eq("Models/Foo.cs"))
            .times(1)
            .returning(|_| Ok(()));

        let outcome = uninstall_file(&project, "Models/Foo.cs.pp", "namespace $rootnamespace$.Models {}")
            .await
            .unwrap();
        assert_eq!(outcome, FileOutcome::Applied);
    }

    #[tokio::test]
    async fn test_merge_creates_missing_target() {
        let mut project = MockProjectAdapter::new();
        project.expect_file_exists().returning(|_| Ok(false));
        project
            .expect_write_file()
            .withf(|path, contents| path == "web.config" && contents.contains("<appSettings"))
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = install_file(&project, "web.config.transform", "<configuration><appSettings/></configuration>")
            .await
            .unwrap();
        assert_eq!(outcome, FileOutcome::Applied);
    }

    #[tokio::test]
    async fn test_malformed_merge_fragment_is_an_error() {
        let mut project = MockProjectAdapter::new();
        project.expect_file_exists().returning(|_| Ok(true));
        project
            .expect_read_file()
            .returning(|_| Ok("<configuration/>".to_string()));
        project.expect_write_file().never();

        let result = install_file(&project, "web.config.transform", "<configuration>").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_declarative_transform_needs_existing_target() {
        let mut project = MockProjectAdapter::new();
        project.expect_file_exists().returning(|_| Ok(false));
        project.expect_write_file().never();

        let outcome = install_file(&project, "web.config.install.xdt", "<configuration/>")
            .await
            .unwrap();
        assert!(matches!(outcome, FileOutcome::Skipped(_)));
    }
}
