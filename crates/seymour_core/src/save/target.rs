//! Write destination resolution.
//!
//! # Invariants
//! - Order: remembered path, then `directory/<title>.seymour`, then the
//!   project's autosave slot id.
//! - Once a path-based write succeeds its path is reused for the session,
//!   even if the title changes afterwards.

use crate::model::project::{ProjectDocument, UNTITLED};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extension of project files composed from a directory and title.
pub const PROJECT_FILE_EXTENSION: &str = "seymour";

const MAX_FILE_STEM_CHARS: usize = 120;

/// Where one write goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Path(PathBuf),
    /// Opaque autosave slot in the application-managed directory.
    ProjectId(String),
}

/// Session memory of where the open project lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTargets {
    path: Option<PathBuf>,
    project_id: String,
}

impl SaveTargets {
    /// Targets for a project that has never been written.
    pub fn fresh() -> Self {
        Self::for_slot(Uuid::new_v4().to_string())
    }

    pub fn for_slot(project_id: impl Into<String>) -> Self {
        Self {
            path: None,
            project_id: project_id.into(),
        }
    }

    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            project_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn resolve(&self, document: &ProjectDocument) -> SaveTarget {
        if let Some(path) = &self.path {
            return SaveTarget::Path(path.clone());
        }
        if let Some(dir) = document
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
        {
            return SaveTarget::Path(Path::new(dir).join(project_file_name(&document.title)));
        }
        SaveTarget::ProjectId(self.project_id.clone())
    }

    /// Records the outcome of a successful write to `target`.
    pub fn remember(&mut self, target: &SaveTarget, written: &Path) {
        match target {
            SaveTarget::Path(_) => self.path = Some(written.to_path_buf()),
            SaveTarget::ProjectId(id) => self.project_id = id.clone(),
        }
    }

    /// Points future writes at `target` regardless of earlier history.
    pub fn retarget(&mut self, target: &SaveTarget) {
        match target {
            SaveTarget::Path(path) => self.path = Some(path.clone()),
            SaveTarget::ProjectId(id) => {
                self.path = None;
                self.project_id = id.clone();
            }
        }
    }
}

/// `<sanitized title>.seymour`.
pub fn project_file_name(title: &str) -> String {
    let stem = title
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .take(MAX_FILE_STEM_CHARS)
        .collect::<String>();
    let stem = stem.trim_matches(|ch: char| ch == '.' || ch.is_whitespace());
    let stem = if stem.is_empty() { UNTITLED } else { stem };
    format!("{stem}.{PROJECT_FILE_EXTENSION}")
}
