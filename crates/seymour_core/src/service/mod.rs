//! Project-level use cases above the save coordinator.
//!
//! # Responsibility
//! - Open, create and list projects without UI code touching the store.
//! - Own the per-session editor caches and clear them on project switch.

pub mod editor_cache;
pub mod project_service;
