//! Save coordination between bursty edits and serialized disk writes.
//!
//! # Responsibility
//! - Count accepted mutations and expose one observable save status.
//! - Debounce edits into infrequent writes, one write in flight at a time.
//! - Decide where each write goes (remembered path, directory + title, slot).
//!
//! # Invariants
//! - A nonzero dirty counter always shows `Unsaved changes...` or `Saving...`.
//! - The counter is reset only by a successful write that observed the
//!   current counter value.
//! - A failed write never touches the counter.

pub mod coordinator;
pub mod machine;
pub mod status;
pub mod target;

pub use coordinator::{
    CoordinatorConfig, FlushReason, ProjectUpdate, SaveCoordinator, SaveError, SaveOutcome,
    SaveTrigger, SkipReason, UpdateOptions,
};
pub use machine::{Completion, SaveMachine, SaveTicket};
pub use status::SaveStatus;
pub use target::{project_file_name, SaveTarget, SaveTargets};
