//! Filesystem-backed `ProjectStore`.
//!
//! # Responsibility
//! - Store explicit-path projects wherever the host points.
//! - Store id-keyed autosave slots as `<projects_dir>/<id>.json`.
//!
//! # Invariants
//! - Every project write goes through `atomic_write`.
//! - Blocking file work runs on tokio's blocking pool.
//! - Slot ids never contain path separators.

use crate::model::project::{Chapter, ProjectDocument, UNTITLED};
use crate::persist::atomic::atomic_write;
use crate::persist::text_backup::{backup_path_for, render_manuscript};
use crate::persist::{ProjectStore, ProjectSummary, StoreError, StoreResult};
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

const SLOT_EXTENSION: &str = "json";
const MAX_PROJECT_ID_CHARS: usize = 128;

/// Filesystem store rooted at an application-managed projects directory.
#[derive(Debug, Clone)]
pub struct FsProjectStore {
    projects_dir: PathBuf,
}

impl FsProjectStore {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Slot file for `id`, rejecting ids that could escape the directory.
    pub fn slot_path(&self, id: &str) -> StoreResult<PathBuf> {
        validate_project_id(id)?;
        Ok(self
            .projects_dir
            .join(format!("{id}.{SLOT_EXTENSION}")))
    }
}

/// Accepts non-empty ids of at most 128 `[A-Za-z0-9_-]` characters.
pub fn validate_project_id(id: &str) -> StoreResult<()> {
    let valid = !id.is_empty()
        && id.chars().count() <= MAX_PROJECT_ID_CHARS
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidProjectId(id.to_string()))
    }
}

#[async_trait]
impl ProjectStore for FsProjectStore {
    async fn write_project_by_path(
        &self,
        path: &Path,
        document: &ProjectDocument,
    ) -> StoreResult<PathBuf> {
        let bytes = serde_json::to_vec_pretty(document)?;
        write_atomically(path.to_path_buf(), bytes).await
    }

    async fn write_project_by_id(
        &self,
        id: &str,
        document: &ProjectDocument,
    ) -> StoreResult<PathBuf> {
        let path = self.slot_path(id)?;
        let bytes = serde_json::to_vec_pretty(document)?;
        write_atomically(path, bytes).await
    }

    async fn read_project_by_path(&self, path: &Path) -> StoreResult<Vec<u8>> {
        let path = path.to_path_buf();
        run_blocking(move || fs::read(&path).map_err(|err| StoreError::io(path, err))).await
    }

    async fn read_project_by_id(&self, id: &str) -> StoreResult<Vec<u8>> {
        let path = self.slot_path(id)?;
        self.read_project_by_path(&path).await
    }

    async fn list_project_summaries(&self) -> StoreResult<Vec<ProjectSummary>> {
        let dir = self.projects_dir.clone();
        run_blocking(move || list_slots(&dir)).await
    }

    async fn write_text_backup(
        &self,
        project_path: &Path,
        chapters: &[Chapter],
    ) -> StoreResult<PathBuf> {
        let path = backup_path_for(project_path);
        let text = render_manuscript(chapters);
        run_blocking(move || {
            fs::write(&path, text).map_err(|err| StoreError::io(path.clone(), err))?;
            Ok(path)
        })
        .await
    }
}

async fn write_atomically(path: PathBuf, bytes: Vec<u8>) -> StoreResult<PathBuf> {
    run_blocking(move || {
        let started_at = Instant::now();
        atomic_write(&path, &bytes).map_err(|err| StoreError::io(path.clone(), err))?;
        info!(
            "event=project_write module=persist status=ok bytes={} duration_ms={}",
            bytes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(path)
    })
    .await
}

async fn run_blocking<T, F>(work: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
}

/// Only the title is needed for listings; everything else is ignored.
#[derive(Deserialize)]
struct TitleProbe {
    #[serde(default)]
    title: Option<String>,
}

fn list_slots(dir: &Path) -> StoreResult<Vec<ProjectSummary>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(StoreError::io(dir, err)),
    };

    let mut summaries = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| StoreError::io(dir, err))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SLOT_EXTENSION) {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if validate_project_id(id).is_err() {
            continue;
        }
        match read_summary(&path, id) {
            Ok(summary) => summaries.push(summary),
            Err(err) => warn!(
                "event=project_list module=persist status=skipped id={} error={}",
                id, err
            ),
        }
    }

    summaries.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(summaries)
}

fn read_summary(path: &Path, id: &str) -> Result<ProjectSummary, String> {
    let bytes = fs::read(path).map_err(|err| err.to_string())?;
    let probe: TitleProbe = serde_json::from_slice(&bytes).map_err(|err| err.to_string())?;
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|err| err.to_string())?;
    let last_modified = modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0);

    Ok(ProjectSummary {
        id: id.to_string(),
        title: probe
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        last_modified,
    })
}

#[cfg(test)]
mod tests {
    use super::validate_project_id;

    #[test]
    fn project_ids_reject_separators_and_empty() {
        assert!(validate_project_id("slot-01_a").is_ok());
        assert!(validate_project_id("").is_err());
        assert!(validate_project_id("../escape").is_err());
        assert!(validate_project_id("a/b").is_err());
        assert!(validate_project_id(&"x".repeat(129)).is_err());
    }
}
