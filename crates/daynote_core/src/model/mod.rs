//! Entity values owned by the directories.
//!
//! # Responsibility
//! - Define the record/tag shapes and the handles used to reference them.
//! - Keep values plain; index maintenance lives in `crate::directory`.
//!
//! # Invariants
//! - Entities never hold strong references to each other; records point at
//!   tags through `TagHandle` only.

pub mod record;
pub mod tag;
