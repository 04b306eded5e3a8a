//! Flutter-facing bridge for Seymour.
//! Exposes use-case level sync functions; all domain logic stays in
//! `seymour_core`.

pub mod api;
