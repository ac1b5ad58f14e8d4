//! Tag directory: ownership, name/key indices and the focus slot.
//!
//! # Responsibility
//! - Own every `Tag` for the application lifetime.
//! - Maintain `name -> tag` and `storage key -> tag` indices.
//! - Track the single focused tag.
//!
//! # Invariants
//! - The name index maps each non-empty name to exactly one live tag.
//! - Empty names are never indexed.
//! - At most one tag has `focused == true`, and it is the one in the slot.
//! - Renaming onto a taken name does not merge; the existing holder keeps
//!   the index entry and the caller is told about it (`NameChange::Shadowed`).

use crate::arena::Arena;
use crate::directory::{DirectoryError, DirectoryResult, TagEvent, TagsDirectoryEvent};
use crate::model::tag::{Tag, TagColor, TagHandle};
use crate::observe::{Notification, SubscriptionId, SubscriptionIds, Subscribers};
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use uuid::Uuid;

/// Outcome of a tag rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameChange {
    /// New name equals the current one; nothing was published.
    Unchanged,
    /// Name index now maps the new name to this tag.
    Renamed,
    /// Another live tag already holds the new name and keeps the index
    /// entry; reconciling the two is up to the caller.
    Shadowed { existing: TagHandle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Directory,
    Tag(TagHandle),
}

struct TagSlot {
    tag: Tag,
    observers: Subscribers<TagEvent>,
}

enum Notice {
    Tag(Notification<TagEvent>),
    Directory(Notification<TagsDirectoryEvent>),
}

#[derive(Default)]
struct Outbox {
    notices: Vec<Notice>,
    retired: Vec<SubscriptionId>,
}

impl Outbox {
    fn tag(&mut self, slot: &TagSlot, event: TagEvent) {
        if !slot.observers.is_empty() {
            self.notices.push(Notice::Tag(slot.observers.notification(event)));
        }
    }

    fn directory(&mut self, observers: &Subscribers<TagsDirectoryEvent>, event: TagsDirectoryEvent) {
        if !observers.is_empty() {
            self.notices.push(Notice::Directory(observers.notification(event)));
        }
    }
}

struct TagsState {
    tags: Arena<TagSlot>,
    by_name: HashMap<String, TagHandle>,
    by_key: HashMap<String, TagHandle>,
    focused: Option<TagHandle>,
    observers: Subscribers<TagsDirectoryEvent>,
    topics: HashMap<SubscriptionId, Topic>,
    ids: SubscriptionIds,
}

impl TagsState {
    fn slot(&self, tag: TagHandle) -> DirectoryResult<&TagSlot> {
        self.tags.get(tag.key()).ok_or(DirectoryError::StaleTag(tag))
    }

    fn slot_mut(&mut self, tag: TagHandle) -> DirectoryResult<&mut TagSlot> {
        self.tags
            .get_mut(tag.key())
            .ok_or(DirectoryError::StaleTag(tag))
    }

    fn insert(&mut self, tag: Tag, outbox: &mut Outbox) -> TagHandle {
        let handle = TagHandle::new(self.tags.insert(TagSlot {
            tag,
            observers: Subscribers::new(),
        }));
        outbox.directory(&self.observers, TagsDirectoryEvent::TagAdded(handle));
        handle
    }

    /// Drops `tag` from the name index entry for `name` and hands the entry
    /// to another live tag carrying the same name, if any.
    fn release_name(&mut self, name: &str, tag: TagHandle) {
        if name.is_empty() || self.by_name.get(name) != Some(&tag) {
            return;
        }
        self.by_name.remove(name);
        let heir = self
            .tags
            .iter()
            .map(|(key, slot)| (TagHandle::new(key), slot))
            .find(|(handle, slot)| *handle != tag && slot.tag.name == name)
            .map(|(handle, _)| handle);
        if let Some(heir) = heir {
            trace!("event=tag_name_promoted module=tags tag={heir}");
            self.by_name.insert(name.to_string(), heir);
        }
    }

    fn set_focus(&mut self, target: Option<TagHandle>, outbox: &mut Outbox) {
        let previous = self.focused;
        if previous == target {
            return;
        }
        if let Some(previous) = previous {
            if let Some(slot) = self.tags.get_mut(previous.key()) {
                slot.tag.focused = false;
                outbox.tag(slot, TagEvent::FocusChanged(false));
            }
        }
        if let Some(target) = target {
            if let Some(slot) = self.tags.get_mut(target.key()) {
                slot.tag.focused = true;
                outbox.tag(slot, TagEvent::FocusChanged(true));
            }
        }
        self.focused = target;
        outbox.directory(
            &self.observers,
            TagsDirectoryEvent::FocusChanged {
                previous,
                current: target,
            },
        );
    }

    fn retire_tag_observers(&self, slot: &TagSlot, outbox: &mut Outbox) {
        outbox.retired.extend(slot.observers.ids());
    }
}

/// Owner of all tags. Cloning yields another handle to the same directory.
#[derive(Clone)]
pub struct TagsDirectory {
    inner: Rc<RefCell<TagsState>>,
}

impl Debug for TagsDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("TagsDirectory");
        match self.inner.try_borrow() {
            Ok(state) => out
                .field("tags", &state.tags.len())
                .field("focused", &state.focused),
            Err(_) => out.field("state", &"<borrowed>"),
        };
        out.finish()
    }
}

impl Default for TagsDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl TagsDirectory {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TagsState {
                tags: Arena::new(),
                by_name: HashMap::new(),
                by_key: HashMap::new(),
                focused: None,
                observers: Subscribers::new(),
                topics: HashMap::new(),
                ids: SubscriptionIds::default(),
            })),
        }
    }

    /// Exact name lookup. Empty names never match.
    pub fn get_tag_by_name(&self, name: &str) -> Option<TagHandle> {
        self.inner.borrow().by_name.get(name).copied()
    }

    /// Lookup by opaque storage key.
    pub fn get_tag_by_key(&self, key: &str) -> Option<TagHandle> {
        self.inner.borrow().by_key.get(key).copied()
    }

    /// Allocates an unnamed, unindexed tag.
    pub fn create_tag(&self) -> TagHandle {
        let mut outbox = Outbox::default();
        let handle = self.inner.borrow_mut().insert(Tag::new(None), &mut outbox);
        debug!("event=tag_created module=tags tag={handle}");
        self.dispatch(outbox);
        handle
    }

    /// Returns the tag stored under `key`, creating it on first use.
    pub fn get_or_create_tag(&self, key: &str) -> TagHandle {
        if let Some(existing) = self.get_tag_by_key(key) {
            return existing;
        }

        let mut outbox = Outbox::default();
        let handle = {
            let mut state = self.inner.borrow_mut();
            let handle = state.insert(Tag::new(Some(key.to_string())), &mut outbox);
            state.by_key.insert(key.to_string(), handle);
            handle
        };
        debug!("event=tag_created module=tags tag={handle} keyed=true");
        self.dispatch(outbox);
        handle
    }

    /// Returns the tag's storage key, assigning a fresh UUID if it has none.
    pub fn ensure_key(&self, tag: TagHandle) -> DirectoryResult<String> {
        let mut state = self.inner.borrow_mut();
        if let Some(key) = state.slot(tag)?.tag.key.clone() {
            return Ok(key);
        }
        let key = Uuid::new_v4().to_string();
        state.slot_mut(tag)?.tag.key = Some(key.clone());
        state.by_key.insert(key.clone(), tag);
        trace!("event=tag_key_assigned module=tags tag={tag}");
        Ok(key)
    }

    /// Renames a tag, keeping the name index consistent.
    pub fn set_name(&self, tag: TagHandle, name: impl Into<String>) -> DirectoryResult<NameChange> {
        let name = name.into();
        let mut outbox = Outbox::default();
        let change = {
            let mut state = self.inner.borrow_mut();
            let old = state.slot(tag)?.tag.name.clone();
            if old == name {
                return Ok(NameChange::Unchanged);
            }

            state.release_name(&old, tag);

            let change = match state.by_name.get(&name).copied() {
                _ if name.is_empty() => NameChange::Renamed,
                Some(existing) if existing != tag => NameChange::Shadowed { existing },
                _ => {
                    state.by_name.insert(name.clone(), tag);
                    NameChange::Renamed
                }
            };

            let slot = state.slot_mut(tag)?;
            let color_changed = slot.tag.assign_name(name.clone());
            outbox.tag(slot, TagEvent::NameChanged { old, new: name });
            if color_changed {
                let color = slot.tag.color;
                outbox.tag(slot, TagEvent::ColorChanged(color));
            }
            change
        };

        match change {
            NameChange::Shadowed { existing } => {
                warn!("event=tag_name_collision module=tags tag={tag} existing={existing}");
            }
            _ => debug!("event=tag_renamed module=tags tag={tag}"),
        }
        self.dispatch(outbox);
        Ok(change)
    }

    /// Removes a tag. Records still referencing it keep a stale handle.
    pub fn remove_tag(&self, tag: TagHandle) -> DirectoryResult<()> {
        let mut outbox = Outbox::default();
        {
            let mut state = self.inner.borrow_mut();
            let (name, key) = {
                let slot = state.slot(tag)?;
                (slot.tag.name.clone(), slot.tag.key.clone())
            };

            if state.focused == Some(tag) {
                state.set_focus(None, &mut outbox);
            }
            state.release_name(&name, tag);
            if let Some(key) = key {
                state.by_key.remove(&key);
            }

            if let Some(slot) = state.tags.remove(tag.key()) {
                outbox.tag(&slot, TagEvent::Removed);
                state.retire_tag_observers(&slot, &mut outbox);
            }
            let observers = &state.observers;
            outbox.directory(observers, TagsDirectoryEvent::TagRemoved(tag));
        }
        debug!("event=tag_removed module=tags tag={tag}");
        self.dispatch(outbox);
        Ok(())
    }

    /// Removes every tag and clears focus.
    pub fn clear_tags(&self) {
        let mut outbox = Outbox::default();
        let count = {
            let mut state = self.inner.borrow_mut();
            let count = state.tags.len();
            state.set_focus(None, &mut outbox);
            for key in state.tags.keys() {
                if let Some(slot) = state.tags.remove(key) {
                    outbox.tag(&slot, TagEvent::Removed);
                    state.retire_tag_observers(&slot, &mut outbox);
                }
            }
            state.by_name.clear();
            state.by_key.clear();
            let observers = &state.observers;
            outbox.directory(observers, TagsDirectoryEvent::TagsCleared);
            count
        };
        debug!("event=tags_cleared module=tags removed={count}");
        self.dispatch(outbox);
    }

    /// Sets the single focused tag; `None` clears focus. Re-focusing the
    /// current tag publishes nothing.
    pub fn focus_tag(&self, tag: Option<TagHandle>) -> DirectoryResult<()> {
        let mut outbox = Outbox::default();
        {
            let mut state = self.inner.borrow_mut();
            if let Some(tag) = tag {
                state.slot(tag)?;
            }
            state.set_focus(tag, &mut outbox);
        }
        if !outbox.notices.is_empty() {
            trace!("event=tag_focus_changed module=tags focused={}", tag.is_some());
        }
        self.dispatch(outbox);
        Ok(())
    }

    pub fn focused_tag(&self) -> Option<TagHandle> {
        self.inner.borrow().focused
    }

    pub fn is_focused(&self, tag: TagHandle) -> DirectoryResult<bool> {
        Ok(self.inner.borrow().slot(tag)?.tag.focused)
    }

    pub fn name(&self, tag: TagHandle) -> DirectoryResult<String> {
        Ok(self.inner.borrow().slot(tag)?.tag.name.clone())
    }

    pub fn color(&self, tag: TagHandle) -> DirectoryResult<TagColor> {
        Ok(self.inner.borrow().slot(tag)?.tag.color)
    }

    /// Field snapshot of one tag.
    pub fn tag(&self, tag: TagHandle) -> DirectoryResult<Tag> {
        Ok(self.inner.borrow().slot(tag)?.tag.clone())
    }

    pub fn contains(&self, tag: TagHandle) -> bool {
        self.inner.borrow().tags.contains(tag.key())
    }

    /// Live tag handles in slot order.
    pub fn tags(&self) -> Vec<TagHandle> {
        self.inner
            .borrow()
            .tags
            .keys()
            .into_iter()
            .map(TagHandle::new)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().tags.is_empty()
    }

    /// Subscribes to directory-wide events.
    pub fn subscribe(&self, callback: impl Fn(&TagsDirectoryEvent) + 'static) -> SubscriptionId {
        let mut state = self.inner.borrow_mut();
        let id = state.ids.next();
        state.observers.add(id, Rc::new(callback));
        state.topics.insert(id, Topic::Directory);
        id
    }

    /// Subscribes to field changes of one tag.
    pub fn subscribe_tag(
        &self,
        tag: TagHandle,
        callback: impl Fn(&TagEvent) + 'static,
    ) -> DirectoryResult<SubscriptionId> {
        let mut state = self.inner.borrow_mut();
        state.slot(tag)?;
        let id = state.ids.next();
        state.slot_mut(tag)?.observers.add(id, Rc::new(callback));
        state.topics.insert(id, Topic::Tag(tag));
        Ok(id)
    }

    /// Removes a subscription made on this directory or one of its tags.
    /// Safe to call from inside a callback.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.borrow_mut();
        match state.topics.remove(&id) {
            Some(Topic::Directory) => state.observers.remove(id),
            Some(Topic::Tag(tag)) => {
                if let Some(slot) = state.tags.get_mut(tag.key()) {
                    slot.observers.remove(id);
                }
                true
            }
            None => false,
        }
    }

    fn dispatch(&self, outbox: Outbox) {
        let Outbox { notices, retired } = outbox;
        let is_live = |id: SubscriptionId| self.inner.borrow().topics.contains_key(&id);
        for notice in notices {
            match notice {
                Notice::Tag(notification) => notification.deliver(is_live),
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

#[cfg(test)]
mod tests {
    use super::{NameChange, TagsDirectory};

    #[test]
    fn empty_name_is_not_indexed() {
        let tags = TagsDirectory::new();
        let tag = tags.create_tag();
        assert_eq!(tags.get_tag_by_name(""), None);
        assert_eq!(tags.set_name(tag, "").unwrap(), NameChange::Unchanged);
    }

    #[test]
    fn removing_index_holder_promotes_shadowed_tag() {
        let tags = TagsDirectory::new();
        let first = tags.create_tag();
        let second = tags.create_tag();
        tags.set_name(first, "work").unwrap();
        assert_eq!(
            tags.set_name(second, "work").unwrap(),
            NameChange::Shadowed { existing: first }
        );
        assert_eq!(tags.get_tag_by_name("work"), Some(first));

        tags.remove_tag(first).unwrap();
        assert_eq!(tags.get_tag_by_name("work"), Some(second));
    }

    #[test]
    fn ensure_key_is_stable_and_indexed() {
        let tags = TagsDirectory::new();
        let tag = tags.create_tag();
        let key = tags.ensure_key(tag).unwrap();
        assert_eq!(tags.ensure_key(tag).unwrap(), key);
        assert_eq!(tags.get_tag_by_key(&key), Some(tag));
        assert_eq!(tags.get_or_create_tag(&key), tag);
    }
}
