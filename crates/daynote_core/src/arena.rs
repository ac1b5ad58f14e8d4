//! Generational slot arena backing directory-owned entities.
//!
//! # Responsibility
//! - Own entity values behind stable, copyable keys.
//! - Detect use of a key after its entity was removed (stale key).
//!
//! # Invariants
//! - A key resolves only while its slot generation matches.
//! - A key minted by one arena never resolves in another arena.
//! - Freed slots are reused with a bumped generation.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ARENA_OWNER: AtomicU32 = AtomicU32::new(1);

/// Stable key into one [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaKey {
    owner: u32,
    index: u32,
    generation: u32,
}

impl ArenaKey {
    /// Slot position inside the owning arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl Display for ArenaKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}v{}", self.owner, self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with generation-checked keys.
pub struct Arena<T> {
    owner: u32,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            owner: NEXT_ARENA_OWNER.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its key.
    pub fn insert(&mut self, value: T) -> ArenaKey {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return ArenaKey {
                owner: self.owner,
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ArenaKey {
            owner: self.owner,
            index,
            generation: 0,
        }
    }

    /// Removes the value behind `key`, invalidating every copy of the key.
    pub fn remove(&mut self, key: ArenaKey) -> Option<T> {
        if !self.contains(key) {
            return None;
        }
        let slot = &mut self.slots[key.index as usize];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        value
    }

    pub fn contains(&self, key: ArenaKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: ArenaKey) -> Option<&T> {
        if key.owner != self.owner {
            return None;
        }
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, key: ArenaKey) -> Option<&mut T> {
        if key.owner != self.owner {
            return None;
        }
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaKey, &T)> + '_ {
        let owner = self.owner;
        self.slots.iter().enumerate().filter_map(move |(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    ArenaKey {
                        owner,
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ArenaKey, &mut T)> + '_ {
        let owner = self.owner;
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, slot)| {
                let generation = slot.generation;
                slot.value.as_mut().map(|value| {
                    (
                        ArenaKey {
                            owner,
                            index: index as u32,
                            generation,
                        },
                        value,
                    )
                })
            })
    }

    pub fn keys(&self) -> Vec<ArenaKey> {
        self.iter().map(|(key, _)| key).collect()
    }

    /// Removes every entry; all previously issued keys become stale.
    pub fn clear(&mut self) {
        for key in self.keys() {
            self.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Arena;

    #[test]
    fn removed_key_is_stale_even_after_slot_reuse() {
        let mut arena = Arena::new();
        let first = arena.insert("first");
        assert_eq!(arena.remove(first), Some("first"));

        let second = arena.insert("second");
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&"second"));
    }

    #[test]
    fn keys_do_not_resolve_across_arenas() {
        let mut left = Arena::new();
        let mut right = Arena::new();
        let key = left.insert(1);
        right.insert(2);
        assert!(right.get(key).is_none());
    }

    #[test]
    fn clear_invalidates_all_keys() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        arena.clear();
        assert!(arena.is_empty());
        assert!(!arena.contains(a));
        assert!(!arena.contains(b));
    }
}
