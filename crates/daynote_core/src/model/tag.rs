//! Tag entity value.
//!
//! # Responsibility
//! - Describe one named, colorable label.
//! - Derive display color from the name.
//!
//! # Invariants
//! - `color` always equals `color_for_name(name)`.
//! - `focused` is written only by `TagsDirectory::focus_tag`.

use crate::arena::ArenaKey;
use std::fmt::{Display, Formatter};

/// Non-owning reference to a tag inside one `TagsDirectory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagHandle(ArenaKey);

impl TagHandle {
    pub(crate) fn new(key: ArenaKey) -> Self {
        Self(key)
    }

    pub(crate) fn key(self) -> ArenaKey {
        self.0
    }
}

impl Display for TagHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag@{}", self.0)
    }
}

/// RGB display color of a tag label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl TagColor {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Lowercase `#rrggbb` form.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

const PALETTE: &[TagColor] = &[
    TagColor::new(137, 180, 250),
    TagColor::new(166, 227, 161),
    TagColor::new(249, 226, 175),
    TagColor::new(245, 194, 231),
    TagColor::new(255, 169, 167),
    TagColor::new(148, 226, 213),
    TagColor::new(198, 160, 246),
    TagColor::new(240, 198, 198),
    TagColor::new(181, 232, 224),
    TagColor::new(183, 189, 248),
    TagColor::new(255, 214, 165),
    TagColor::new(179, 255, 171),
    TagColor::new(255, 201, 210),
    TagColor::new(186, 225, 255),
    TagColor::new(255, 241, 173),
    TagColor::new(214, 182, 255),
];

/// Deterministic palette color for a tag name (djb2-xor hash).
pub fn color_for_name(name: &str) -> TagColor {
    let mut hash: u64 = 5381;
    for byte in name.bytes() {
        hash = hash.wrapping_shl(5).wrapping_add(hash) ^ u64::from(byte);
    }
    PALETTE[(hash % PALETTE.len() as u64) as usize]
}

/// Snapshot of one tag's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub(crate) key: Option<String>,
    pub(crate) name: String,
    pub(crate) focused: bool,
    pub(crate) color: TagColor,
}

impl Tag {
    pub(crate) fn new(key: Option<String>) -> Self {
        Self {
            key,
            name: String::new(),
            focused: false,
            color: color_for_name(""),
        }
    }

    /// Opaque storage identifier, distinct from the display name.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn color(&self) -> TagColor {
        self.color
    }

    /// Writes the name and recomputes the color; returns whether the color
    /// changed.
    pub(crate) fn assign_name(&mut self, name: String) -> bool {
        let color = color_for_name(&name);
        self.name = name;
        let changed = color != self.color;
        self.color = color;
        changed
    }
}
