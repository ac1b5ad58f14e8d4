//! Record entity value.
//!
//! # Responsibility
//! - Describe one dated (or undated) note with completion flag and tags.
//! - Define the partition key used to classify records into sets.
//!
//! # Invariants
//! - `tags` never contains the same `TagHandle` twice.
//! - `id == None` means the identifier has not been assigned yet.

use crate::arena::ArenaKey;
use crate::model::tag::TagHandle;
use chrono::NaiveDate;
use std::fmt::{Display, Formatter};

/// Non-owning reference to a record inside one `RecordsDirectory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHandle(ArenaKey);

impl RecordHandle {
    pub(crate) fn new(key: ArenaKey) -> Self {
        Self(key)
    }

    pub(crate) fn key(self) -> ArenaKey {
        self.0
    }
}

impl Display for RecordHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "record@{}", self.0)
    }
}

/// Classification bucket of a record: a calendar date or the undated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionKey {
    Undated,
    Date(NaiveDate),
}

impl From<Option<NaiveDate>> for PartitionKey {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map_or(Self::Undated, Self::Date)
    }
}

impl Display for PartitionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undated => write!(f, "undated"),
            Self::Date(date) => write!(f, "{date}"),
        }
    }
}

/// Snapshot of one record's fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub(crate) id: Option<String>,
    pub(crate) date: Option<NaiveDate>,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) complete: bool,
    pub(crate) tags: Vec<TagHandle>,
}

impl Record {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn partition(&self) -> PartitionKey {
        PartitionKey::from(self.date)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Tags in insertion order.
    pub fn tags(&self) -> &[TagHandle] {
        &self.tags
    }

    pub fn has_tag(&self, tag: TagHandle) -> bool {
        self.tags.contains(&tag)
    }
}

/// Deduplicates by handle, keeping first occurrence order.
pub(crate) fn dedup_tags(tags: impl IntoIterator<Item = TagHandle>) -> Vec<TagHandle> {
    let mut unique: Vec<TagHandle> = Vec::new();
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::PartitionKey;
    use chrono::NaiveDate;

    #[test]
    fn partition_key_from_optional_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(PartitionKey::from(Some(date)), PartitionKey::Date(date));
        assert_eq!(PartitionKey::from(None), PartitionKey::Undated);
        assert_eq!(PartitionKey::Date(date).to_string(), "2024-03-01");
    }
}
