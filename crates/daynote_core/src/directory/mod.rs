//! Owning directories with automatically maintained indices.
//!
//! # Responsibility
//! - Own all records (per page) and all tags (per application).
//! - Keep id/name/date indices consistent on every mutation.
//! - Publish change notifications after indices are consistent.
//!
//! # Invariants
//! - Rejected operations leave every index untouched.
//! - Callbacks run with no internal borrow held, so they may query or
//!   mutate the same directory.
//! - Directories are single-threaded (`Rc`-shared) by construction.

use crate::model::record::RecordHandle;
use crate::model::tag::{TagColor, TagHandle};
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod record_set;
pub mod records;
pub mod tags;

pub use record_set::RecordSet;
pub use records::RecordsDirectory;
pub use tags::{NameChange, TagsDirectory};

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors raised by directory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Record handle was removed or belongs to another directory.
    StaleRecord(RecordHandle),
    /// Tag handle was removed or belongs to another directory.
    StaleTag(TagHandle),
    /// Requested record id already identifies a different record.
    DuplicateRecordId { id: String, existing: RecordHandle },
    /// Live view outlived its owning directory.
    Detached,
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleRecord(handle) => write!(f, "stale record handle: {handle}"),
            Self::StaleTag(handle) => write!(f, "stale tag handle: {handle}"),
            Self::DuplicateRecordId { id, existing } => {
                write!(f, "record id `{id}` already used by {existing}")
            }
            Self::Detached => write!(f, "record set is detached from its directory"),
        }
    }
}

impl Error for DirectoryError {}

/// Field-level change on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    IdChanged {
        old: Option<String>,
        new: Option<String>,
    },
    DateChanged {
        old: Option<NaiveDate>,
        new: Option<NaiveDate>,
    },
    TitleChanged(String),
    DescriptionChanged(String),
    CompleteChanged(bool),
    TagsChanged(Vec<TagHandle>),
    Removed,
}

/// Aggregate-relevant change on one record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSetEvent {
    /// Records entered or left the set.
    MembershipChanged,
    /// Tag-derived aggregates (tag union, per-tag counts) may differ.
    TagsChanged,
    /// Completion-derived aggregates may differ.
    StatesChanged,
}

/// Directory-wide record lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordsDirectoryEvent {
    RecordAdded(RecordHandle),
    RecordRemoved(RecordHandle),
    RecordsCleared,
}

/// Field-level change on one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    NameChanged { old: String, new: String },
    ColorChanged(TagColor),
    FocusChanged(bool),
    Removed,
}

/// Directory-wide tag lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagsDirectoryEvent {
    TagAdded(TagHandle),
    TagRemoved(TagHandle),
    TagsCleared,
    FocusChanged {
        previous: Option<TagHandle>,
        current: Option<TagHandle>,
    },
}
