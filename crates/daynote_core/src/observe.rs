//! Subscription registry for synchronous change notifications.
//!
//! # Responsibility
//! - Hold callbacks per observable topic in registration order.
//! - Build delivery snapshots so callbacks run with no registry borrow held.
//!
//! # Invariants
//! - Delivery happens only after the originating mutation finished updating
//!   every index.
//! - A callback unsubscribed during delivery is not invoked afterwards, even
//!   if it was part of the snapshot.
//! - Ids minted by one source never match subscriptions of another.

use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ID_OWNER: AtomicU32 = AtomicU32::new(1);

/// Callback type shared by all observable topics.
pub type Callback<E> = Rc<dyn Fn(&E)>;

/// Handle returned by every `subscribe*` call; used to unsubscribe.
///
/// Ids carry the minting source, so an id handed to a different directory
/// never matches one of its subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId {
    owner: u32,
    serial: u64,
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}:{}", self.owner, self.serial)
    }
}

/// Monotonic id source, one per directory.
#[derive(Debug)]
pub(crate) struct SubscriptionIds {
    owner: u32,
    next: u64,
}

impl Default for SubscriptionIds {
    fn default() -> Self {
        Self {
            owner: NEXT_ID_OWNER.fetch_add(1, Ordering::Relaxed),
            next: 0,
        }
    }
}

impl SubscriptionIds {
    pub(crate) fn next(&mut self) -> SubscriptionId {
        self.next += 1;
        SubscriptionId {
            owner: self.owner,
            serial: self.next,
        }
    }
}

/// Ordered callback list for one topic.
pub struct Subscribers<E> {
    entries: Vec<(SubscriptionId, Callback<E>)>,
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E> Subscribers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: SubscriptionId, callback: Callback<E>) {
        self.entries.push((id, callback));
    }

    /// Removes one subscription; returns whether it was present.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        before != self.entries.len()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<SubscriptionId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// Captures the current callbacks together with `event`.
    pub fn notification(&self, event: E) -> Notification<E> {
        Notification {
            event,
            targets: self.entries.clone(),
        }
    }
}

/// One event paired with the callbacks registered when it was raised.
pub struct Notification<E> {
    event: E,
    targets: Vec<(SubscriptionId, Callback<E>)>,
}

impl<E> Notification<E> {
    pub fn event(&self) -> &E {
        &self.event
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Invokes the captured callbacks in registration order, skipping any
    /// that `is_live` reports as unsubscribed by the time it is reached.
    pub fn deliver(self, is_live: impl Fn(SubscriptionId) -> bool) {
        for (id, callback) in self.targets {
            if is_live(id) {
                callback(&self.event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SubscriptionIds, Subscribers};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn delivers_in_registration_order() {
        let mut ids = SubscriptionIds::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut subscribers = Subscribers::<u8>::new();
        for tag in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            subscribers.add(
                ids.next(),
                Rc::new(move |event: &u8| seen.borrow_mut().push(format!("{tag}{event}"))),
            );
        }

        subscribers.notification(7).deliver(|_| true);
        assert_eq!(*seen.borrow(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn skips_targets_reported_dead() {
        let mut ids = SubscriptionIds::default();
        let hits = Rc::new(RefCell::new(0));
        let mut subscribers = Subscribers::<()>::new();
        let first = ids.next();
        let second = ids.next();
        for id in [first, second] {
            let hits = Rc::clone(&hits);
            subscribers.add(id, Rc::new(move |_: &()| *hits.borrow_mut() += 1));
        }

        subscribers.notification(()).deliver(|id| id != second);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn remove_reports_presence() {
        let mut ids = SubscriptionIds::default();
        let mut subscribers = Subscribers::<()>::new();
        let id = ids.next();
        subscribers.add(id, Rc::new(|_: &()| {}));
        assert!(subscribers.remove(id));
        assert!(!subscribers.remove(id));
        assert!(subscribers.is_empty());
    }

    #[test]
    fn ids_from_different_sources_never_collide() {
        let mut left = SubscriptionIds::default();
        let mut right = SubscriptionIds::default();
        let mut subscribers = Subscribers::<()>::new();
        let own = left.next();
        subscribers.add(own, Rc::new(|_: &()| {}));

        let foreign = right.next();
        assert_ne!(own, foreign);
        assert!(!subscribers.remove(foreign));
        assert!(subscribers.contains(own));
    }
}
