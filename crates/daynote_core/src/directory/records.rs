//! Record directory for one loaded page.
//!
//! # Responsibility
//! - Own every `Record` of the page.
//! - Maintain the `id -> record` index and the `partition -> members` index.
//! - Reclassify records on date change and republish affected sets.
//!
//! # Invariants
//! - Record ids are unique; a colliding id change is rejected untouched.
//! - Every live record is a member of exactly one set: its date's, or the
//!   undated one.
//! - Set notifications are published only after both the old and the new
//!   set reflect the move.
//!
//! # See also
//! - `crate::directory::record_set` for the read side.

use crate::arena::Arena;
use crate::directory::record_set::RecordSet;
use crate::directory::{
    DirectoryError, DirectoryResult, RecordEvent, RecordSetEvent, RecordsDirectoryEvent,
};
use crate::model::record::{dedup_tags, PartitionKey, Record, RecordHandle};
use crate::model::tag::TagHandle;
use crate::observe::{Callback, Notification, SubscriptionId, SubscriptionIds, Subscribers};
use chrono::NaiveDate;
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Directory,
    Record(RecordHandle),
    Set(PartitionKey),
}

struct RecordSlot {
    record: Record,
    observers: Subscribers<RecordEvent>,
}

#[derive(Default)]
pub(crate) struct SetState {
    members: Vec<RecordHandle>,
    observers: Subscribers<RecordSetEvent>,
}

enum Notice {
    Record(Notification<RecordEvent>),
    Set(Notification<RecordSetEvent>),
    Directory(Notification<RecordsDirectoryEvent>),
}

#[derive(Default)]
struct Outbox {
    notices: Vec<Notice>,
    retired: Vec<SubscriptionId>,
}

impl Outbox {
    fn record(&mut self, slot: &RecordSlot, event: RecordEvent) {
        if !slot.observers.is_empty() {
            self.notices
                .push(Notice::Record(slot.observers.notification(event)));
        }
    }

    fn set(&mut self, set: Option<&SetState>, event: RecordSetEvent) {
        if let Some(set) = set.filter(|set| !set.observers.is_empty()) {
            self.notices.push(Notice::Set(set.observers.notification(event)));
        }
    }

    fn directory(
        &mut self,
        observers: &Subscribers<RecordsDirectoryEvent>,
        event: RecordsDirectoryEvent,
    ) {
        if !observers.is_empty() {
            self.notices
                .push(Notice::Directory(observers.notification(event)));
        }
    }
}

pub(crate) struct RecordsState {
    records: Arena<RecordSlot>,
    by_id: HashMap<String, RecordHandle>,
    sets: HashMap<PartitionKey, SetState>,
    observers: Subscribers<RecordsDirectoryEvent>,
    topics: HashMap<SubscriptionId, Topic>,
    ids: SubscriptionIds,
}

impl RecordsState {
    fn slot(&self, record: RecordHandle) -> DirectoryResult<&RecordSlot> {
        self.records
            .get(record.key())
            .ok_or(DirectoryError::StaleRecord(record))
    }

    fn slot_mut(&mut self, record: RecordHandle) -> DirectoryResult<&mut RecordSlot> {
        self.records
            .get_mut(record.key())
            .ok_or(DirectoryError::StaleRecord(record))
    }

    fn insert(&mut self, record: Record, outbox: &mut Outbox) -> RecordHandle {
        let partition = record.partition();
        let handle = RecordHandle::new(self.records.insert(RecordSlot {
            record,
            observers: Subscribers::new(),
        }));
        let set = self.sets.entry(partition).or_default();
        set.members.push(handle);
        outbox.set(Some(&*set), RecordSetEvent::MembershipChanged);
        outbox.directory(&self.observers, RecordsDirectoryEvent::RecordAdded(handle));
        handle
    }

    fn emit_set(&self, partition: PartitionKey, event: RecordSetEvent, outbox: &mut Outbox) {
        outbox.set(self.sets.get(&partition), event);
    }

    /// Writes a new tag list for `record` and queues record/set events.
    /// Returns `false` when the list is unchanged.
    fn write_tags(
        &mut self,
        record: RecordHandle,
        tags: Vec<TagHandle>,
        outbox: &mut Outbox,
    ) -> DirectoryResult<bool> {
        let slot = self.slot_mut(record)?;
        if slot.record.tags == tags {
            return Ok(false);
        }
        slot.record.tags = tags.clone();
        let partition = slot.record.partition();
        outbox.record(slot, RecordEvent::TagsChanged(tags));
        self.emit_set(partition, RecordSetEvent::TagsChanged, outbox);
        Ok(true)
    }

    /// Rewrites the tag list of every record carrying `tag`; one
    /// `TagsChanged` per affected set.
    fn rewrite_tag(
        &mut self,
        tag: TagHandle,
        rewrite: impl Fn(&[TagHandle]) -> Vec<TagHandle>,
        outbox: &mut Outbox,
    ) -> usize {
        let mut touched = BTreeSet::new();
        let mut count = 0;
        for (key, slot) in self.records.iter_mut() {
            if !slot.record.has_tag(tag) {
                continue;
            }
            let tags = rewrite(slot.record.tags.as_slice());
            slot.record.tags = tags.clone();
            touched.insert(slot.record.partition());
            outbox.record(slot, RecordEvent::TagsChanged(tags));
            trace!(
                "event=record_tag_rewritten module=records record={}",
                RecordHandle::new(key)
            );
            count += 1;
        }
        for partition in touched {
            self.emit_set(partition, RecordSetEvent::TagsChanged, outbox);
        }
        count
    }

    fn subscribe_set(
        &mut self,
        partition: PartitionKey,
        callback: Callback<RecordSetEvent>,
    ) -> SubscriptionId {
        let id = self.ids.next();
        self.sets
            .entry(partition)
            .or_default()
            .observers
            .add(id, callback);
        self.topics.insert(id, Topic::Set(partition));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.topics.remove(&id) {
            Some(Topic::Directory) => self.observers.remove(id),
            Some(Topic::Record(record)) => {
                if let Some(slot) = self.records.get_mut(record.key()) {
                    slot.observers.remove(id);
                }
                true
            }
            Some(Topic::Set(partition)) => {
                if let Some(set) = self.sets.get_mut(&partition) {
                    set.observers.remove(id);
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn members(&self, partition: PartitionKey) -> Vec<RecordHandle> {
        self.sets
            .get(&partition)
            .map(|set| set.members.clone())
            .unwrap_or_default()
    }

    pub(crate) fn member_count(&self, partition: PartitionKey) -> usize {
        self.sets.get(&partition).map_or(0, |set| set.members.len())
    }

    /// Member records of one set, in insertion order.
    pub(crate) fn member_records(
        &self,
        partition: PartitionKey,
    ) -> impl Iterator<Item = &Record> + '_ {
        self.sets
            .get(&partition)
            .into_iter()
            .flat_map(|set| set.members.iter())
            .filter_map(|handle| self.records.get(handle.key()))
            .map(|slot| &slot.record)
    }
}

/// Owner of all records of one page. Cloning yields another handle to the
/// same directory.
#[derive(Clone)]
pub struct RecordsDirectory {
    inner: Rc<RefCell<RecordsState>>,
}

impl Debug for RecordsDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("RecordsDirectory");
        match self.inner.try_borrow() {
            Ok(state) => out
                .field("records", &state.records.len())
                .field("sets", &state.sets.len()),
            Err(_) => out.field("state", &"<borrowed>"),
        };
        out.finish()
    }
}

impl Default for RecordsDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordsDirectory {
    pub fn new() -> Self {
        let mut sets = HashMap::new();
        sets.insert(PartitionKey::Undated, SetState::default());
        Self {
            inner: Rc::new(RefCell::new(RecordsState {
                records: Arena::new(),
                by_id: HashMap::new(),
                sets,
                observers: Subscribers::new(),
                topics: HashMap::new(),
                ids: SubscriptionIds::default(),
            })),
        }
    }

    /// Live view of the records dated `date`.
    pub fn records_by_date(&self, date: NaiveDate) -> RecordSet {
        self.record_set(PartitionKey::Date(date))
    }

    /// Live view of the records without a date.
    pub fn records_without_date(&self) -> RecordSet {
        self.record_set(PartitionKey::Undated)
    }

    /// Live view of one partition, created on first request.
    pub fn record_set(&self, partition: PartitionKey) -> RecordSet {
        self.inner.borrow_mut().sets.entry(partition).or_default();
        RecordSet::new(Rc::downgrade(&self.inner), partition)
    }

    /// Creates an undated record with no id.
    pub fn create_record(&self) -> RecordHandle {
        let mut outbox = Outbox::default();
        let handle = self
            .inner
            .borrow_mut()
            .insert(Record::default(), &mut outbox);
        debug!("event=record_created module=records record={handle}");
        self.dispatch(outbox);
        handle
    }

    /// Returns the record identified by `id`, creating it when absent. An
    /// empty id is no identifier: it always creates a fresh unidentified
    /// record.
    pub fn get_or_create_record(&self, id: &str) -> RecordHandle {
        if id.is_empty() {
            return self.create_record();
        }
        if let Some(existing) = self.find_record(id) {
            return existing;
        }

        let mut outbox = Outbox::default();
        let handle = {
            let mut state = self.inner.borrow_mut();
            let record = Record {
                id: Some(id.to_string()),
                ..Record::default()
            };
            let handle = state.insert(record, &mut outbox);
            state.by_id.insert(id.to_string(), handle);
            handle
        };
        debug!("event=record_created module=records record={handle} keyed=true");
        self.dispatch(outbox);
        handle
    }

    pub fn find_record(&self, id: &str) -> Option<RecordHandle> {
        self.inner.borrow().by_id.get(id).copied()
    }

    /// Removes a record from every index.
    pub fn remove_record(&self, record: RecordHandle) -> DirectoryResult<()> {
        let mut outbox = Outbox::default();
        {
            let mut state = self.inner.borrow_mut();
            let slot = state
                .records
                .remove(record.key())
                .ok_or(DirectoryError::StaleRecord(record))?;

            if let Some(id) = slot.record.id.as_deref() {
                if state.by_id.get(id) == Some(&record) {
                    state.by_id.remove(id);
                }
            }
            let partition = slot.record.partition();
            if let Some(set) = state.sets.get_mut(&partition) {
                set.members.retain(|member| *member != record);
            }

            outbox.record(&slot, RecordEvent::Removed);
            outbox.retired.extend(slot.observers.ids());
            state.emit_set(partition, RecordSetEvent::MembershipChanged, &mut outbox);
            if !slot.record.tags.is_empty() {
                state.emit_set(partition, RecordSetEvent::TagsChanged, &mut outbox);
            }
            let observers = &state.observers;
            outbox.directory(observers, RecordsDirectoryEvent::RecordRemoved(record));
        }
        debug!("event=record_removed module=records record={record}");
        self.dispatch(outbox);
        Ok(())
    }

    /// Removes every record. Sets stay cached but become empty.
    pub fn clear_records(&self) {
        let mut outbox = Outbox::default();
        let count = {
            let mut state = self.inner.borrow_mut();
            let count = state.records.len();
            let mut tagged = BTreeSet::new();
            for key in state.records.keys() {
                if let Some(slot) = state.records.remove(key) {
                    if !slot.record.tags.is_empty() {
                        tagged.insert(slot.record.partition());
                    }
                    outbox.record(&slot, RecordEvent::Removed);
                    outbox.retired.extend(slot.observers.ids());
                }
            }
            state.by_id.clear();

            let mut emptied: Vec<PartitionKey> = Vec::new();
            for (partition, set) in state.sets.iter_mut() {
                if !set.members.is_empty() {
                    set.members.clear();
                    emptied.push(*partition);
                }
            }
            emptied.sort();
            for partition in emptied {
                state.emit_set(partition, RecordSetEvent::MembershipChanged, &mut outbox);
                if tagged.contains(&partition) {
                    state.emit_set(partition, RecordSetEvent::TagsChanged, &mut outbox);
                }
            }
            let observers = &state.observers;
            outbox.directory(observers, RecordsDirectoryEvent::RecordsCleared);
            count
        };
        debug!("event=records_cleared module=records removed={count}");
        self.dispatch(outbox);
    }

    /// Changes the record id. An empty id unsets it. Rejected without any
    /// change when another record already uses `id`.
    pub fn set_id(&self, record: RecordHandle, id: impl Into<String>) -> DirectoryResult<()> {
        let id = id.into();
        let new = (!id.is_empty()).then_some(id);
        let mut outbox = Outbox::default();
        {
            let mut state = self.inner.borrow_mut();
            let old = state.slot(record)?.record.id.clone();
            if old == new {
                return Ok(());
            }
            if let Some(new_id) = new.as_deref() {
                if let Some(existing) = state.by_id.get(new_id).copied() {
                    if existing != record {
                        warn!(
                            "event=record_id_rejected module=records record={record} existing={existing}"
                        );
                        return Err(DirectoryError::DuplicateRecordId {
                            id: new_id.to_string(),
                            existing,
                        });
                    }
                }
            }

            if let Some(old_id) = old.as_deref() {
                if state.by_id.get(old_id) == Some(&record) {
                    state.by_id.remove(old_id);
                }
            }
            if let Some(new_id) = new.clone() {
                state.by_id.insert(new_id, record);
            }

            let slot = state.slot_mut(record)?;
            slot.record.id = new.clone();
            outbox.record(slot, RecordEvent::IdChanged { old, new });
        }
        debug!("event=record_id_changed module=records record={record}");
        self.dispatch(outbox);
        Ok(())
    }

    /// Returns the record id, assigning a fresh UUID when it is unset.
    pub fn ensure_id(&self, record: RecordHandle) -> DirectoryResult<String> {
        if let Some(id) = self.record(record)?.id {
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.set_id(record, id.clone())?;
        Ok(id)
    }

    /// Changes the record date and moves it to the matching set.
    pub fn set_date(&self, record: RecordHandle, date: Option<NaiveDate>) -> DirectoryResult<()> {
        let mut outbox = Outbox::default();
        let (from, to) = {
            let mut state = self.inner.borrow_mut();
            let slot = state.slot_mut(record)?;
            let old = slot.record.date;
            if old == date {
                return Ok(());
            }
            slot.record.date = date;
            let tagged = !slot.record.tags.is_empty();
            outbox.record(slot, RecordEvent::DateChanged { old, new: date });

            let from = PartitionKey::from(old);
            let to = PartitionKey::from(date);
            if let Some(set) = state.sets.get_mut(&from) {
                set.members.retain(|member| *member != record);
            }
            state.sets.entry(to).or_default().members.push(record);

            for partition in [from, to] {
                state.emit_set(partition, RecordSetEvent::MembershipChanged, &mut outbox);
                if tagged {
                    state.emit_set(partition, RecordSetEvent::TagsChanged, &mut outbox);
                }
            }
            (from, to)
        };
        debug!("event=record_reclassified module=records record={record} from={from} to={to}");
        self.dispatch(outbox);
        Ok(())
    }

    pub fn set_title(&self, record: RecordHandle, title: impl Into<String>) -> DirectoryResult<()> {
        let title = title.into();
        let mut outbox = Outbox::default();
        {
            let mut state = self.inner.borrow_mut();
            let slot = state.slot_mut(record)?;
            if slot.record.title == title {
                return Ok(());
            }
            slot.record.title = title.clone();
            outbox.record(slot, RecordEvent::TitleChanged(title));
        }
        self.dispatch(outbox);
        Ok(())
    }

    pub fn set_description(
        &self,
        record: RecordHandle,
        description: impl Into<String>,
    ) -> DirectoryResult<()> {
        let description = description.into();
        let mut outbox = Outbox::default();
        {
            let mut state = self.inner.borrow_mut();
            let slot = state.slot_mut(record)?;
            if slot.record.description == description {
                return Ok(());
            }
            slot.record.description = description.clone();
            outbox.record(slot, RecordEvent::DescriptionChanged(description));
        }
        self.dispatch(outbox);
        Ok(())
    }

    pub fn set_complete(&self, record: RecordHandle, complete: bool) -> DirectoryResult<()> {
        let mut outbox = Outbox::default();
        {
            let mut state = self.inner.borrow_mut();
            let slot = state.slot_mut(record)?;
            if slot.record.complete == complete {
                return Ok(());
            }
            slot.record.complete = complete;
            let partition = slot.record.partition();
            outbox.record(slot, RecordEvent::CompleteChanged(complete));
            state.emit_set(partition, RecordSetEvent::StatesChanged, &mut outbox);
        }
        trace!("event=record_state_changed module=records record={record} complete={complete}");
        self.dispatch(outbox);
        Ok(())
    }

    /// Replaces the tag list; duplicates are dropped, first occurrence wins.
    pub fn set_tags(
        &self,
        record: RecordHandle,
        tags: impl IntoIterator<Item = TagHandle>,
    ) -> DirectoryResult<()> {
        let tags = dedup_tags(tags);
        let mut outbox = Outbox::default();
        let changed = self
            .inner
            .borrow_mut()
            .write_tags(record, tags, &mut outbox)?;
        if changed {
            trace!("event=record_tags_changed module=records record={record}");
        }
        self.dispatch(outbox);
        Ok(())
    }

    /// Appends `tag`; returns `false` if the record already carries it.
    pub fn add_tag(&self, record: RecordHandle, tag: TagHandle) -> DirectoryResult<bool> {
        let mut tags = self.record(record)?.tags;
        if tags.contains(&tag) {
            return Ok(false);
        }
        tags.push(tag);
        self.set_tags(record, tags)?;
        Ok(true)
    }

    /// Drops `tag`; returns `false` if the record did not carry it.
    pub fn remove_tag(&self, record: RecordHandle, tag: TagHandle) -> DirectoryResult<bool> {
        let mut tags = self.record(record)?.tags;
        let before = tags.len();
        tags.retain(|candidate| *candidate != tag);
        if tags.len() == before {
            return Ok(false);
        }
        self.set_tags(record, tags)?;
        Ok(true)
    }

    /// Drops `tag` from every record; returns how many records changed.
    pub fn strip_tag(&self, tag: TagHandle) -> usize {
        let mut outbox = Outbox::default();
        let count = self.inner.borrow_mut().rewrite_tag(
            tag,
            |tags| tags.iter().copied().filter(|t| *t != tag).collect(),
            &mut outbox,
        );
        debug!("event=tag_stripped module=records tag={tag} records={count}");
        self.dispatch(outbox);
        count
    }

    /// Re-points every link to `from` at `to`, keeping position; records
    /// already carrying `to` just lose `from`. Returns how many records
    /// changed.
    pub fn replace_tag(&self, from: TagHandle, to: TagHandle) -> usize {
        if from == to {
            return 0;
        }
        let mut outbox = Outbox::default();
        let count = self.inner.borrow_mut().rewrite_tag(
            from,
            |tags| dedup_tags(tags.iter().map(|t| if *t == from { to } else { *t })),
            &mut outbox,
        );
        debug!("event=tag_replaced module=records from={from} to={to} records={count}");
        self.dispatch(outbox);
        count
    }

    /// Field snapshot of one record.
    pub fn record(&self, record: RecordHandle) -> DirectoryResult<Record> {
        Ok(self.inner.borrow().slot(record)?.record.clone())
    }

    pub fn contains(&self, record: RecordHandle) -> bool {
        self.inner.borrow().records.contains(record.key())
    }

    /// Live record handles in slot order.
    pub fn records(&self) -> Vec<RecordHandle> {
        self.inner
            .borrow()
            .records
            .keys()
            .into_iter()
            .map(RecordHandle::new)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().records.is_empty()
    }

    /// Subscribes to directory-wide lifecycle events.
    pub fn subscribe(
        &self,
        callback: impl Fn(&RecordsDirectoryEvent) + 'static,
    ) -> SubscriptionId {
        let mut state = self.inner.borrow_mut();
        let id = state.ids.next();
        state.observers.add(id, Rc::new(callback));
        state.topics.insert(id, Topic::Directory);
        id
    }

    /// Subscribes to field changes of one record.
    pub fn subscribe_record(
        &self,
        record: RecordHandle,
        callback: impl Fn(&RecordEvent) + 'static,
    ) -> DirectoryResult<SubscriptionId> {
        let mut state = self.inner.borrow_mut();
        state.slot(record)?;
        let id = state.ids.next();
        state.slot_mut(record)?.observers.add(id, Rc::new(callback));
        state.topics.insert(id, Topic::Record(record));
        Ok(id)
    }

    /// Removes any subscription made on this directory, one of its records
    /// or one of its sets. Safe to call from inside a callback.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.borrow_mut().unsubscribe(id)
    }

    fn dispatch(&self, outbox: Outbox) {
        let Outbox { notices, retired } = outbox;
        let is_live = |id: SubscriptionId| self.inner.borrow().topics.contains_key(&id);
        for notice in notices {
            match notice {
                Notice::Record(notification) => notification.deliver(is_live),
                Notice::Set(notification) => notification.deliver(is_live),
                Notice::Directory(notification) => notification.deliver(is_live),
            }
        }
        if !retired.is_empty() {
            let mut state = self.inner.borrow_mut();
            for id in retired {
                state.topics.remove(&id);
            }
        }
    }
}

pub(crate) fn subscribe_set(
    state: &RefCell<RecordsState>,
    partition: PartitionKey,
    callback: Callback<RecordSetEvent>,
) -> SubscriptionId {
    state.borrow_mut().subscribe_set(partition, callback)
}

pub(crate) fn unsubscribe(state: &RefCell<RecordsState>, id: SubscriptionId) -> bool {
    state.borrow_mut().unsubscribe(id)
}

#[cfg(test)]
mod tests {
    use super::RecordsDirectory;
    use crate::model::record::PartitionKey;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn set_date_moves_membership_between_sets() {
        let records = RecordsDirectory::new();
        let record = records.create_record();
        assert_eq!(records.inner.borrow().members(PartitionKey::Undated), vec![record]);

        records.set_date(record, Some(day(1))).unwrap();
        let state = records.inner.borrow();
        assert!(state.members(PartitionKey::Undated).is_empty());
        assert_eq!(state.members(PartitionKey::Date(day(1))), vec![record]);
    }

    #[test]
    fn set_tags_deduplicates_by_handle() {
        let tags = crate::directory::TagsDirectory::new();
        let work = tags.create_tag();
        let records = RecordsDirectory::new();
        let record = records.create_record();
        records.set_tags(record, [work, work]).unwrap();
        assert_eq!(records.record(record).unwrap().tags(), &[work]);
    }

    #[test]
    fn empty_id_unsets_identifier() {
        let records = RecordsDirectory::new();
        let record = records.get_or_create_record("a");
        records.set_id(record, "").unwrap();
        assert_eq!(records.record(record).unwrap().id(), None);
        assert_eq!(records.find_record("a"), None);
    }

    #[test]
    fn debug_reports_counts() {
        let records = RecordsDirectory::new();
        records.create_record();
        let rendered = format!("{records:?}");
        assert!(rendered.starts_with("RecordsDirectory"));
        assert!(rendered.contains("records: 1"));
    }
}
