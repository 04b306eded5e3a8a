//! Core domain logic for Seymour.
//! Owns the project document, its persistence and the save pipeline; UI
//! hosts reach it through `seymour_ffi`.

pub mod logging;
pub mod model;
pub mod persist;
pub mod save;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::merge::{default_skeleton, deep_merge, merge_with_defaults, parse_project, LoadError};
pub use model::project::{
    Chapter, LoreDatabase, LoreEntity, LoreFolder, ProjectDocument, ProjectSettings,
};
pub use persist::{FsProjectStore, ProjectStore, ProjectSummary, StoreError, StoreResult};
pub use save::{
    CoordinatorConfig, FlushReason, ProjectUpdate, SaveCoordinator, SaveError, SaveOutcome,
    SaveStatus, SaveTarget, SaveTargets, SaveTrigger, SkipReason, UpdateOptions,
};
pub use service::editor_cache::EditorCaches;
pub use service::project_service::{OpenError, ProjectService, ProjectSource, StartupWarning};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
