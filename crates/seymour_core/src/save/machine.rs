//! Save status state machine.
//!
//! # Responsibility
//! - Own the dirty counter and the `Saved`/`Unsaved`/`Saving` status.
//! - Reconcile a finished write against edits that arrived while it ran.
//!
//! # Invariants
//! - `dirty` only grows between successful writes.
//! - `complete_success` resets `dirty` only when the ticket observed the
//!   current value.
//! - `complete_failure` never touches `dirty`.
//! - Mutations during `Saving` keep the status at `Saving`; the completion
//!   decides what comes next.

use crate::save::status::SaveStatus;

/// Dirty counter value captured when a write was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    observed: u64,
}

impl SaveTicket {
    pub fn observed(self) -> u64 {
        self.observed
    }
}

/// Result of reconciling a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Nothing changed during the write; disk is current.
    Saved,
    /// Edits arrived mid-write; `dirty` is still pending.
    Behind { dirty: u64 },
}

#[derive(Debug, Clone)]
pub struct SaveMachine {
    dirty: u64,
    status: SaveStatus,
    in_flight: Option<SaveTicket>,
}

impl Default for SaveMachine {
    fn default() -> Self {
        Self {
            dirty: 0,
            status: SaveStatus::Saved,
            in_flight: None,
        }
    }
}

impl SaveMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn in_flight(&self) -> Option<SaveTicket> {
        self.in_flight
    }

    /// Counts one accepted mutation; returns the new counter value.
    pub fn record_mutation(&mut self) -> u64 {
        self.dirty += 1;
        if self.status == SaveStatus::Saved {
            self.status = SaveStatus::Unsaved;
        }
        self.dirty
    }

    /// Enters `Saving` and captures the counter for later reconciliation.
    pub fn begin_save(&mut self) -> SaveTicket {
        debug_assert!(self.in_flight.is_none(), "writes must be serialized");
        let ticket = SaveTicket {
            observed: self.dirty,
        };
        self.status = SaveStatus::Saving;
        self.in_flight = Some(ticket);
        ticket
    }

    pub fn complete_success(&mut self, ticket: SaveTicket) -> Completion {
        self.in_flight = None;
        if self.dirty == ticket.observed {
            self.dirty = 0;
            self.status = SaveStatus::Saved;
            Completion::Saved
        } else {
            self.status = SaveStatus::Unsaved;
            Completion::Behind { dirty: self.dirty }
        }
    }

    pub fn complete_failure(&mut self, _ticket: SaveTicket) {
        self.in_flight = None;
        self.status = SaveStatus::Unsaved;
    }

    /// Forgets all pending state; used when a document is replaced wholesale.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
