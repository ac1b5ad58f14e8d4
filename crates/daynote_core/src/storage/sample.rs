//! Placeholder backend fabricating fixed sample data.
//!
//! Reads always produce three tags and two records (first and last day of
//! the range). Saves and removals are only journaled in memory.

use crate::directory::{RecordsDirectory, TagsDirectory};
use crate::model::record::RecordHandle;
use crate::page::PageRange;
use crate::storage::snapshot::{load_page, PageSnapshot, RecordSnapshot, TagSnapshot};
use crate::storage::{PageStorage, StorageResult};
use log::{debug, info};

#[derive(Debug, Default)]
pub struct SampleStorage {
    saved: Vec<RecordSnapshot>,
    removed: Vec<String>,
    pages_read: usize,
}

impl SampleStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest saved state per record id, in first-save order.
    pub fn saved(&self) -> &[RecordSnapshot] {
        &self.saved
    }

    /// Ids passed to `remove_record`, in call order.
    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// The fixed data served for `range`.
    pub fn sample_page(range: PageRange) -> PageSnapshot {
        let tag = |n: u32| TagSnapshot {
            key: format!("sample-tag-{n}"),
            name: format!("tag-{n}"),
        };
        let record = |n: u32, date, tag_keys: [u32; 2]| RecordSnapshot {
            id: format!("sample-record-{n}"),
            date: Some(date),
            title: format!("Sample record {n}"),
            description: String::new(),
            complete: false,
            tag_keys: tag_keys
                .iter()
                .map(|key| format!("sample-tag-{key}"))
                .collect(),
        };

        PageSnapshot {
            tags: vec![tag(1), tag(2), tag(3)],
            records: vec![
                record(1, range.first(), [1, 2]),
                record(2, range.last(), [2, 3]),
            ],
        }
    }
}

impl PageStorage for SampleStorage {
    fn read_page(
        &mut self,
        range: PageRange,
        records: &RecordsDirectory,
        tags: &TagsDirectory,
    ) -> StorageResult<()> {
        load_page(records, tags, &Self::sample_page(range))?;
        self.pages_read += 1;
        info!("event=page_read module=sample_storage status=ok range={range}");
        Ok(())
    }

    fn save_record(
        &mut self,
        records: &RecordsDirectory,
        tags: &TagsDirectory,
        record: RecordHandle,
    ) -> StorageResult<()> {
        let snapshot = RecordSnapshot::capture(records, tags, record)?;
        debug!("event=record_saved module=sample_storage record={record}");
        match self.saved.iter_mut().find(|saved| saved.id == snapshot.id) {
            Some(existing) => *existing = snapshot,
            None => self.saved.push(snapshot),
        }
        Ok(())
    }

    fn remove_record(
        &mut self,
        records: &RecordsDirectory,
        record: RecordHandle,
    ) -> StorageResult<()> {
        let Some(id) = records.record(record)?.id().map(str::to_string) else {
            debug!("event=record_remove_skipped module=sample_storage reason=no_id");
            return Ok(());
        };
        self.saved.retain(|saved| saved.id != id);
        self.removed.push(id);
        Ok(())
    }
}
