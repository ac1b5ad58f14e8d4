//! Serializable record/tag snapshots for bulk load and save.
//!
//! # Invariants
//! - Records reference tags by storage key, never by name.
//! - Capturing assigns missing record ids and tag keys (UUID v4) first.
//! - Loading goes through `get_or_create_*`, so reloading is idempotent.

use crate::directory::{DirectoryResult, RecordsDirectory, TagsDirectory};
use crate::model::record::RecordHandle;
use crate::storage::StorageResult;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub id: String,
    /// Serialized as ISO `YYYY-MM-DD`; `null` for undated records.
    pub date: Option<NaiveDate>,
    pub title: String,
    pub description: String,
    pub complete: bool,
    pub tag_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub tags: Vec<TagSnapshot>,
    pub records: Vec<RecordSnapshot>,
}

impl RecordSnapshot {
    /// Captures one record. Tags that were removed from the tag directory
    /// are left out.
    pub fn capture(
        records: &RecordsDirectory,
        tags: &TagsDirectory,
        record: RecordHandle,
    ) -> DirectoryResult<Self> {
        let id = records.ensure_id(record)?;
        let value = records.record(record)?;
        let mut tag_keys = Vec::with_capacity(value.tags().len());
        for tag in value.tags() {
            if tags.contains(*tag) {
                tag_keys.push(tags.ensure_key(*tag)?);
            } else {
                warn!("event=snapshot_stale_tag module=storage record={record} tag={tag}");
            }
        }
        Ok(Self {
            id,
            date: value.date(),
            title: value.title().to_string(),
            description: value.description().to_string(),
            complete: value.is_complete(),
            tag_keys,
        })
    }

    /// Writes this snapshot into `records`, creating the record if needed.
    pub fn restore(
        &self,
        records: &RecordsDirectory,
        tags: &TagsDirectory,
    ) -> DirectoryResult<RecordHandle> {
        let record = records.get_or_create_record(&self.id);
        records.set_date(record, self.date)?;
        records.set_title(record, self.title.as_str())?;
        records.set_description(record, self.description.as_str())?;
        records.set_complete(record, self.complete)?;
        let resolved: Vec<_> = self
            .tag_keys
            .iter()
            .map(|key| tags.get_or_create_tag(key))
            .collect();
        records.set_tags(record, resolved)?;
        Ok(record)
    }
}

/// Captures every named tag and every record of the page.
pub fn capture_page(
    records: &RecordsDirectory,
    tags: &TagsDirectory,
) -> StorageResult<PageSnapshot> {
    let mut snapshot = PageSnapshot::default();
    for record in records.records() {
        snapshot
            .records
            .push(RecordSnapshot::capture(records, tags, record)?);
    }
    for tag in tags.tags() {
        let name = tags.name(tag)?;
        if name.is_empty() {
            continue;
        }
        snapshot.tags.push(TagSnapshot {
            key: tags.ensure_key(tag)?,
            name,
        });
    }
    debug!(
        "event=page_captured module=storage tags={} records={}",
        snapshot.tags.len(),
        snapshot.records.len()
    );
    Ok(snapshot)
}

/// Loads tags first, then records.
pub fn load_page(
    records: &RecordsDirectory,
    tags: &TagsDirectory,
    snapshot: &PageSnapshot,
) -> StorageResult<()> {
    for tag in &snapshot.tags {
        let handle = tags.get_or_create_tag(&tag.key);
        tags.set_name(handle, tag.name.as_str())?;
    }
    for record in &snapshot.records {
        record.restore(records, tags)?;
    }
    debug!(
        "event=page_loaded module=storage tags={} records={}",
        snapshot.tags.len(),
        snapshot.records.len()
    );
    Ok(())
}
