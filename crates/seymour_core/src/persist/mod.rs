//! Persistence backend contracts and the filesystem implementation.
//!
//! # Responsibility
//! - Define the storage operations the save coordinator depends on.
//! - Keep atomic-replace and file layout details behind `ProjectStore`.
//!
//! # Invariants
//! - Project writes are atomic: a reader sees the old file or the new file,
//!   never a partial one.
//! - Reads return raw bytes; shape validation belongs to `model::merge`.
//! - Text backups are best-effort and never part of a project write.

use crate::model::project::{Chapter, ProjectDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub mod atomic;
pub mod fs_store;
pub mod text_backup;

pub use fs_store::FsProjectStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a persistence backend operation.
#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: io::Error },
    /// Id is empty, too long, or contains characters outside `[A-Za-z0-9_-]`.
    InvalidProjectId(String),
    Serialize(serde_json::Error),
    /// Background file task panicked or was cancelled.
    Task(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` when the target file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::InvalidProjectId(id) => write!(f, "invalid project id: `{id}`"),
            Self::Serialize(err) => write!(f, "failed to serialize project: {err}"),
            Self::Task(message) => write!(f, "storage task failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::InvalidProjectId(_) | Self::Task(_) => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Listing entry for one id-keyed project slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    /// Unix epoch milliseconds of the slot file's last write.
    pub last_modified: i64,
}

/// Storage operations consumed by the save coordinator and project service.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Atomically writes `document` to `path`; returns the written path.
    async fn write_project_by_path(
        &self,
        path: &Path,
        document: &ProjectDocument,
    ) -> StoreResult<PathBuf>;

    /// Atomically writes `document` into the slot for `id`; returns its path.
    async fn write_project_by_id(
        &self,
        id: &str,
        document: &ProjectDocument,
    ) -> StoreResult<PathBuf>;

    async fn read_project_by_path(&self, path: &Path) -> StoreResult<Vec<u8>>;

    async fn read_project_by_id(&self, id: &str) -> StoreResult<Vec<u8>>;

    /// Id-keyed slots, newest first.
    async fn list_project_summaries(&self) -> StoreResult<Vec<ProjectSummary>>;

    /// Writes a plain-text manuscript copy next to `project_path`.
    async fn write_text_backup(
        &self,
        project_path: &Path,
        chapters: &[Chapter],
    ) -> StoreResult<PathBuf>;
}
