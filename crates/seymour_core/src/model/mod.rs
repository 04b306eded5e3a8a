//! Project document model and load-time normalization.
//!
//! # Responsibility
//! - Define the single persisted entity (`ProjectDocument`) and its parts.
//! - Turn untrusted on-disk JSON into a well-formed document.
//!
//! # Invariants
//! - Every document deserializes with at least an empty manuscript and an
//!   empty lore database.
//! - Unknown top-level and chapter fields written by other hosts survive a
//!   load/save cycle; unknown fields on other nested records are dropped.

pub mod merge;
pub mod project;
