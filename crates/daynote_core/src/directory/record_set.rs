//! Live per-partition view over a `RecordsDirectory`.
//!
//! # Responsibility
//! - Answer membership and tag/completion aggregate queries for one date
//!   (or the undated bucket).
//! - Route set-level subscriptions to the owning directory.
//!
//! # Invariants
//! - Every query reads current directory state; nothing is cached here.
//! - The view holds only a weak reference; once the directory is dropped the
//!   view reports no members and refuses new subscriptions.

use crate::directory::records::{self, RecordsState};
use crate::directory::{DirectoryError, DirectoryResult, RecordSetEvent};
use crate::model::record::{PartitionKey, RecordHandle};
use crate::model::tag::TagHandle;
use crate::observe::SubscriptionId;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};

/// Records currently classified under one partition key.
#[derive(Clone)]
pub struct RecordSet {
    directory: Weak<RefCell<RecordsState>>,
    partition: PartitionKey,
}

impl Debug for RecordSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSet")
            .field("partition", &self.partition)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl RecordSet {
    pub(crate) fn new(directory: Weak<RefCell<RecordsState>>, partition: PartitionKey) -> Self {
        Self {
            directory,
            partition,
        }
    }

    pub fn partition(&self) -> PartitionKey {
        self.partition
    }

    /// Date of this set; `None` for the undated set.
    pub fn date(&self) -> Option<NaiveDate> {
        match self.partition {
            PartitionKey::Date(date) => Some(date),
            PartitionKey::Undated => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.directory.strong_count() > 0
    }

    fn read<T>(&self, fallback: T, query: impl FnOnce(&RecordsState) -> T) -> T {
        match self.directory.upgrade() {
            Some(directory) => {
                let state = directory.borrow();
                query(&*state)
            }
            None => fallback,
        }
    }

    /// Members in insertion order.
    pub fn records(&self) -> Vec<RecordHandle> {
        self.read(Vec::new(), |state| state.members(self.partition))
    }

    pub fn len(&self) -> usize {
        self.read(0, |state| state.member_count(self.partition))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, record: RecordHandle) -> bool {
        self.records().contains(&record)
    }

    /// Union of member tags, deduplicated by handle, in first-seen order.
    pub fn all_tags(&self) -> Vec<TagHandle> {
        self.read(Vec::new(), |state| {
            let mut tags: Vec<TagHandle> = Vec::new();
            for record in state.member_records(self.partition) {
                for tag in record.tags() {
                    if !tags.contains(tag) {
                        tags.push(*tag);
                    }
                }
            }
            tags
        })
    }

    /// Number of members carrying `tag`.
    pub fn num_records_with_tag(&self, tag: TagHandle) -> usize {
        self.read(0, |state| {
            state
                .member_records(self.partition)
                .filter(|record| record.has_tag(tag))
                .count()
        })
    }

    /// True iff every member carrying `tag` is complete; vacuously true when
    /// no member carries it.
    pub fn check_all_records_with_tag_complete(&self, tag: TagHandle) -> bool {
        self.read(true, |state| {
            state
                .member_records(self.partition)
                .filter(|record| record.has_tag(tag))
                .all(|record| record.is_complete())
        })
    }

    /// Subscribes to membership and aggregate changes of this set.
    pub fn subscribe(
        &self,
        callback: impl Fn(&RecordSetEvent) + 'static,
    ) -> DirectoryResult<SubscriptionId> {
        let directory = self.directory.upgrade().ok_or(DirectoryError::Detached)?;
        Ok(records::subscribe_set(
            &directory,
            self.partition,
            Rc::new(callback),
        ))
    }

    /// Safe to call from inside a callback.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.directory
            .upgrade()
            .is_some_and(|directory| records::unsubscribe(&directory, id))
    }
}

#[cfg(test)]
mod tests {
    use crate::directory::{DirectoryError, RecordsDirectory};
    use chrono::NaiveDate;

    #[test]
    fn detached_view_is_empty_and_rejects_subscriptions() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let set = {
            let records = RecordsDirectory::new();
            let record = records.create_record();
            records.set_date(record, Some(date)).unwrap();
            records.records_by_date(date)
        };

        assert!(!set.is_attached());
        assert!(set.is_empty());
        assert_eq!(set.subscribe(|_| {}).unwrap_err(), DirectoryError::Detached);
    }
}
