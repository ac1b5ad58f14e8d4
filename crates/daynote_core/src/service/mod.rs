//! Caller-side policies layered over the directories.
//!
//! # Responsibility
//! - Hold decisions the directories leave to their callers, such as how
//!   colliding tag names are merged.

pub mod tag_policy;
