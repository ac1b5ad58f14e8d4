//! Tag binding policy used by editing surfaces.
//!
//! # Responsibility
//! - Turn free-form label text into directory tags (get-or-create by name).
//! - Reconcile a rename onto an existing name by merging into the existing
//!   tag, which the directories deliberately do not do themselves.
//!
//! # Invariants
//! - Tag names are trimmed and inner whitespace is collapsed; case is kept.
//! - Blank names never produce tags.
//! - After a merge no record in the given page references the discarded tag.

use crate::directory::{DirectoryError, NameChange, RecordsDirectory, TagsDirectory};
use crate::model::record::RecordHandle;
use crate::model::tag::TagHandle;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Errors from tag policy operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPolicyError {
    /// Name is empty after normalization.
    BlankTagName,
    Directory(DirectoryError),
}

impl Display for TagPolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTagName => write!(f, "tag name must not be blank"),
            Self::Directory(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TagPolicyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Directory(err) => Some(err),
            Self::BlankTagName => None,
        }
    }
}

impl From<DirectoryError> for TagPolicyError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

/// Result of [`rename_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Unchanged,
    Renamed,
    /// The new name belonged to `survivor`; links were moved there and the
    /// renamed tag was removed.
    Merged {
        survivor: TagHandle,
        relinked: usize,
    },
}

/// Trims and collapses whitespace; `None` when nothing is left.
pub fn normalize_tag_name(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Returns the tag named `raw_name`, creating and naming one if needed.
pub fn resolve_tag(tags: &TagsDirectory, raw_name: &str) -> Result<TagHandle, TagPolicyError> {
    let name = normalize_tag_name(raw_name).ok_or(TagPolicyError::BlankTagName)?;
    if let Some(existing) = tags.get_tag_by_name(&name) {
        return Ok(existing);
    }
    let created = tags.create_tag();
    tags.set_name(created, name)?;
    Ok(created)
}

/// Replaces a record's tags from label text. Blank labels are skipped and
/// repeated names collapse onto one tag.
pub fn assign_tag_names<S: AsRef<str>>(
    records: &RecordsDirectory,
    tags: &TagsDirectory,
    record: RecordHandle,
    names: &[S],
) -> Result<Vec<TagHandle>, TagPolicyError> {
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        match resolve_tag(tags, name.as_ref()) {
            Ok(tag) => resolved.push(tag),
            Err(TagPolicyError::BlankTagName) => continue,
            Err(err) => return Err(err),
        }
    }
    records.set_tags(record, resolved)?;
    Ok(records.record(record)?.tags().to_vec())
}

/// Renames `tag`. When another tag already owns the new name, every link in
/// `records` is re-pointed to it, focus follows, and `tag` is removed.
pub fn rename_tag(
    records: &RecordsDirectory,
    tags: &TagsDirectory,
    tag: TagHandle,
    raw_name: &str,
) -> Result<RenameOutcome, TagPolicyError> {
    let name = normalize_tag_name(raw_name).ok_or(TagPolicyError::BlankTagName)?;
    match tags.set_name(tag, name)? {
        NameChange::Unchanged => Ok(RenameOutcome::Unchanged),
        NameChange::Renamed => Ok(RenameOutcome::Renamed),
        NameChange::Shadowed { existing } => {
            let relinked = records.replace_tag(tag, existing);
            if tags.focused_tag() == Some(tag) {
                tags.focus_tag(Some(existing))?;
            }
            tags.remove_tag(tag)?;
            info!(
                "event=tag_merged module=tag_policy from={tag} into={existing} relinked={relinked}"
            );
            Ok(RenameOutcome::Merged {
                survivor: existing,
                relinked,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_tag_name;

    #[test]
    fn normalize_trims_and_collapses_whitespace() {
        assert_eq!(
            normalize_tag_name("  deep \t work ").as_deref(),
            Some("deep work")
        );
        assert_eq!(normalize_tag_name("Work").as_deref(), Some("Work"));
    }

    #[test]
    fn normalize_rejects_blank() {
        assert_eq!(normalize_tag_name(" \n "), None);
    }
}
