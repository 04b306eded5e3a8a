//! Project open/create/list use cases.
//!
//! # Responsibility
//! - Hydrate the coordinator on launch, falling back to an empty project
//!   when the last one cannot be read.
//! - Switch projects only after the current one is flushed.
//! - Own `EditorCaches` for the session.
//!
//! # Invariants
//! - A failed open (flush, read or corruption) keeps the current project.
//! - Edits accepted while the next project is being read are written to the
//!   current project before the switch.
//! - Caches are cleared exactly when the open project changes.

use crate::model::merge::{parse_project, LoadError};
use crate::model::project::ProjectDocument;
use crate::persist::{ProjectStore, ProjectSummary, StoreError, StoreResult};
use crate::save::{
    CoordinatorConfig, FlushReason, SaveCoordinator, SaveError, SaveTarget, SaveTargets,
    SaveTrigger,
};
use crate::service::editor_cache::EditorCaches;
use log::{info, warn};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Where a project is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSource {
    Path(PathBuf),
    /// Autosave slot id in the application-managed directory.
    Slot(String),
}

impl ProjectSource {
    fn targets(&self) -> SaveTargets {
        match self {
            Self::Path(path) => SaveTargets::for_path(path.clone()),
            Self::Slot(id) => SaveTargets::for_slot(id.clone()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Slot(_) => "slot",
        }
    }
}

impl From<SaveTarget> for ProjectSource {
    fn from(value: SaveTarget) -> Self {
        match value {
            SaveTarget::Path(path) => Self::Path(path),
            SaveTarget::ProjectId(id) => Self::Slot(id),
        }
    }
}

/// User-visible notice that launch fell back to an empty project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupWarning {
    pub message: String,
}

#[derive(Debug)]
pub enum OpenError {
    /// The current project could not be saved before switching.
    Flush(SaveError),
    Store(StoreError),
    Load(LoadError),
}

impl Display for OpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flush(err) => write!(f, "current project could not be saved: {err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Load(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Flush(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Load(err) => Some(err),
        }
    }
}

impl From<StoreError> for OpenError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<LoadError> for OpenError {
    fn from(value: LoadError) -> Self {
        Self::Load(value)
    }
}

/// Application context: the open project, its store and session caches.
pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
    coordinator: SaveCoordinator,
    caches: Mutex<EditorCaches>,
}

impl ProjectService {
    pub fn new(store: Arc<dyn ProjectStore>, config: CoordinatorConfig, runtime: Handle) -> Self {
        let coordinator = SaveCoordinator::new(Arc::clone(&store), config, runtime);
        Self {
            store,
            coordinator,
            caches: Mutex::new(EditorCaches::new()),
        }
    }

    pub fn coordinator(&self) -> &SaveCoordinator {
        &self.coordinator
    }

    pub fn with_caches<R>(&self, f: impl FnOnce(&mut EditorCaches) -> R) -> R {
        f(&mut *self.caches.lock())
    }

    /// Hydrates the coordinator with the last project, if any.
    ///
    /// Read and corruption failures never abort launch: an empty project is
    /// installed instead and a warning is returned for the UI.
    pub async fn startup(&self, last_project: Option<ProjectSource>) -> Option<StartupWarning> {
        let Some(source) = last_project else {
            self.coordinator
                .hydrate(ProjectDocument::default(), SaveTargets::fresh());
            return None;
        };

        match self.load(&source).await {
            Ok(document) => {
                self.coordinator.hydrate(document, source.targets());
                info!(
                    "event=project_startup module=service status=ok source={}",
                    source.kind()
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=project_startup module=service status=error source={} error={}",
                    source.kind(),
                    err
                );
                self.coordinator
                    .hydrate(ProjectDocument::default(), SaveTargets::fresh());
                Some(StartupWarning {
                    message: format!(
                        "The last project could not be opened ({err}). Started with an empty project."
                    ),
                })
            }
        }
    }

    /// Flushes the open project, then replaces it with `source`.
    pub async fn open(&self, source: ProjectSource) -> Result<(), OpenError> {
        self.flush_before_switch().await?;
        let document = match self.load(&source).await {
            Ok(document) => document,
            Err(err) => {
                warn!(
                    "event=project_open module=service status=error source={} error={}",
                    source.kind(),
                    err
                );
                return Err(err);
            }
        };
        self.coordinator
            .replace_document(document, source.targets())
            .await
            .map_err(OpenError::Flush)?;
        self.caches.lock().clear();
        info!(
            "event=project_open module=service status=ok source={}",
            source.kind()
        );
        Ok(())
    }

    /// Flushes the open project, then starts a new one in a fresh slot.
    pub async fn new_project(&self, title: &str) -> Result<(), OpenError> {
        self.flush_before_switch().await?;
        self.coordinator
            .replace_document(ProjectDocument::new(title), SaveTargets::fresh())
            .await
            .map_err(OpenError::Flush)?;
        self.caches.lock().clear();
        info!("event=project_new module=service status=ok");
        Ok(())
    }

    pub async fn list_projects(&self) -> StoreResult<Vec<ProjectSummary>> {
        self.store.list_project_summaries().await
    }

    async fn flush_before_switch(&self) -> Result<(), OpenError> {
        self.coordinator
            .save(SaveTrigger::Flush(FlushReason::ProjectSwitch))
            .await
            .map(|_| ())
            .map_err(OpenError::Flush)
    }

    async fn load(&self, source: &ProjectSource) -> Result<ProjectDocument, OpenError> {
        let bytes = match source {
            ProjectSource::Path(path) => self.store.read_project_by_path(path).await?,
            ProjectSource::Slot(id) => self.store.read_project_by_id(id).await?,
        };
        Ok(parse_project(&bytes)?)
    }
}
