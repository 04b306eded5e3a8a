//! Project state store and save coordinator.
//!
//! # Responsibility
//! - Hold the open `ProjectDocument` behind one mutation entry point.
//! - Debounce accepted mutations into writes and serialize every write
//!   (debounce, manual, Save-As, lifecycle flush) through one FIFO turn.
//! - Reconcile finished writes against edits that arrived mid-write.
//!
//! # Invariants
//! - At most one store write is in flight per coordinator.
//! - A queued save re-checks dirtiness after acquiring its turn.
//! - Mutations never wait for a write; they only replace the debounce timer.
//! - A write that has started is never cancelled.
//! - Replacing the open project never discards an accepted mutation.
//! - A failed write leaves the dirty counter untouched and shows
//!   `Unsaved changes...`; the next mutation or flush retries.

use crate::model::project::ProjectDocument;
use crate::persist::{ProjectStore, StoreError};
use crate::save::machine::{Completion, SaveMachine, SaveTicket};
use crate::save::status::SaveStatus;
use crate::save::target::{SaveTarget, SaveTargets};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(700);
const DEFAULT_CATCH_UP_DELAY: Duration = Duration::from_millis(500);
const STATUS_EVENT_CAPACITY: usize = 64;

/// Timing knobs for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Quiet period after the last mutation before an automatic save.
    pub debounce: Duration,
    /// Shorter delay used when a write finished behind newer edits.
    pub catch_up_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            catch_up_delay: DEFAULT_CATCH_UP_DELAY,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_catch_up_delay(mut self, delay: Duration) -> Self {
        self.catch_up_delay = delay;
        self
    }
}

/// Lifecycle events that force a best-effort save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    WindowHidden,
    AppClosing,
    /// The UI is leaving an editing surface.
    NavigateAway,
    /// Another project is about to replace the open one.
    ProjectSwitch,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WindowHidden => "window_hidden",
            Self::AppClosing => "app_closing",
            Self::NavigateAway => "navigate_away",
            Self::ProjectSwitch => "project_switch",
        }
    }
}

/// What asked for a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// Debounce or catch-up timer elapsed.
    Debounce,
    /// Explicit "save now".
    Manual,
    SaveAs,
    Flush(FlushReason),
}

impl SaveTrigger {
    /// Manual saves and Save-As write even when nothing is dirty.
    fn forces_write(self) -> bool {
        matches!(self, Self::Manual | Self::SaveAs)
    }

    fn supersedes_timer(self) -> bool {
        !matches!(self, Self::Debounce)
    }
}

impl Display for SaveTrigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debounce => f.write_str("debounce"),
            Self::Manual => f.write_str("manual"),
            Self::SaveAs => f.write_str("save_as"),
            Self::Flush(reason) => write!(f, "flush_{}", reason.as_str()),
        }
    }
}

/// Why a save request ended without writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Clean,
    AutoSaveDisabled,
    Hydrating,
}

/// Result of one save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written and nothing changed meanwhile.
    Saved { path: PathBuf },
    /// Written, but `dirty` newer mutations are still pending; a catch-up
    /// save is already scheduled.
    Behind { path: PathBuf, dirty: u64 },
    Skipped(SkipReason),
}

#[derive(Debug)]
pub enum SaveError {
    Store(StoreError),
}

impl Display for SaveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "save failed: {err}"),
        }
    }
}

impl Error for SaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for SaveError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// One mutation of the open document.
pub enum ProjectUpdate {
    /// Replace the whole document.
    Replace(ProjectDocument),
    /// Edit the current document in place.
    Edit(Box<dyn FnOnce(&mut ProjectDocument) + Send>),
}

impl ProjectUpdate {
    pub fn edit(edit: impl FnOnce(&mut ProjectDocument) + Send + 'static) -> Self {
        Self::Edit(Box::new(edit))
    }

    fn apply(self, document: &mut ProjectDocument) {
        match self {
            Self::Replace(next) => *document = next,
            Self::Edit(edit) => edit(document),
        }
    }
}

impl From<ProjectDocument> for ProjectUpdate {
    fn from(value: ProjectDocument) -> Self {
        Self::Replace(value)
    }
}

impl Debug for ProjectUpdate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replace(_) => f.write_str("ProjectUpdate::Replace"),
            Self::Edit(_) => f.write_str("ProjectUpdate::Edit"),
        }
    }
}

/// Options for `SaveCoordinator::set_project_data`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Apply without counting a mutation (programmatic loads).
    pub skip_dirty: bool,
}

impl UpdateOptions {
    pub fn skip_dirty() -> Self {
        Self { skip_dirty: true }
    }
}

struct Session {
    document: ProjectDocument,
    machine: SaveMachine,
    targets: SaveTargets,
    /// Set until the first document is installed; mutations are not counted.
    hydrating: bool,
    pending_timer: Option<JoinHandle<()>>,
}

impl Session {
    fn clear_timer(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
    }

    fn skip_reason(&self, trigger: SaveTrigger) -> Option<SkipReason> {
        if self.hydrating {
            return Some(SkipReason::Hydrating);
        }
        if trigger.forces_write() {
            return None;
        }
        if self.machine.dirty() == 0 {
            return Some(SkipReason::Clean);
        }
        if trigger == SaveTrigger::Debounce && !self.document.settings.auto_save {
            return Some(SkipReason::AutoSaveDisabled);
        }
        None
    }
}

struct WriteJob {
    ticket: SaveTicket,
    target: SaveTarget,
    snapshot: ProjectDocument,
}

struct Shared {
    store: Arc<dyn ProjectStore>,
    config: CoordinatorConfig,
    runtime: Handle,
    session: Mutex<Session>,
    /// FIFO turn for store writes; tokio's mutex queues waiters fairly.
    write_turn: tokio::sync::Mutex<()>,
    status_events: broadcast::Sender<SaveStatus>,
}

/// Cheap-to-clone handle to the open project and its save pipeline.
#[derive(Clone)]
pub struct SaveCoordinator {
    shared: Arc<Shared>,
}

impl SaveCoordinator {
    /// Creates a coordinator in its hydrating phase with a default document.
    ///
    /// Timers and background saves are spawned on `runtime`.
    pub fn new(store: Arc<dyn ProjectStore>, config: CoordinatorConfig, runtime: Handle) -> Self {
        let (status_events, _) = broadcast::channel(STATUS_EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                store,
                config,
                runtime,
                session: Mutex::new(Session {
                    document: ProjectDocument::default(),
                    machine: SaveMachine::new(),
                    targets: SaveTargets::fresh(),
                    hydrating: true,
                    pending_timer: None,
                }),
                write_turn: tokio::sync::Mutex::new(()),
                status_events,
            }),
        }
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.shared.config
    }

    /// Applies `update`; unless skipped or hydrating, counts a mutation and
    /// restarts the debounce timer. Returns the dirty counter.
    ///
    /// `Edit` closures run under the session lock and must not call back
    /// into the coordinator.
    pub fn set_project_data(&self, update: impl Into<ProjectUpdate>, options: UpdateOptions) -> u64 {
        let update: ProjectUpdate = update.into();
        let mut session = self.shared.session.lock();
        update.apply(&mut session.document);
        if options.skip_dirty || session.hydrating {
            return session.machine.dirty();
        }

        let before = session.machine.status();
        let dirty = session.machine.record_mutation();
        self.publish_change(before, session.machine.status());
        self.arm_timer(&mut session, self.shared.config.debounce);
        dirty
    }

    /// Snapshot of the open document.
    pub fn document(&self) -> ProjectDocument {
        self.shared.session.lock().document.clone()
    }

    /// Reads the open document without cloning it.
    pub fn with_document<R>(&self, read: impl FnOnce(&ProjectDocument) -> R) -> R {
        read(&self.shared.session.lock().document)
    }

    pub fn dirty_count(&self) -> u64 {
        self.shared.session.lock().machine.dirty()
    }

    pub fn status(&self) -> SaveStatus {
        self.shared.session.lock().machine.status()
    }

    /// Receives every status transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SaveStatus> {
        self.shared.status_events.subscribe()
    }

    pub fn is_hydrating(&self) -> bool {
        self.shared.session.lock().hydrating
    }

    /// Where the next write would go.
    pub fn current_target(&self) -> SaveTarget {
        let session = self.shared.session.lock();
        session.targets.resolve(&session.document)
    }

    pub fn targets(&self) -> SaveTargets {
        self.shared.session.lock().targets.clone()
    }

    /// Installs `document` as clean and ends the hydrating phase.
    ///
    /// Only safe when no write can be in flight (startup); otherwise use
    /// `replace_document`.
    pub fn hydrate(&self, document: ProjectDocument, targets: SaveTargets) {
        let mut session = self.shared.session.lock();
        self.install(&mut session, document, targets);
    }

    /// Ends hydration for hosts that loaded via `skip_dirty` updates.
    pub fn finish_hydration(&self) {
        self.shared.session.lock().hydrating = false;
    }

    /// Replaces the open project once every accepted mutation is on disk.
    ///
    /// Holds the write turn throughout, so edits accepted after an earlier
    /// flush are written to the current target before the swap. If that
    /// write fails the open project is kept and the error is returned.
    pub async fn replace_document(
        &self,
        document: ProjectDocument,
        targets: SaveTargets,
    ) -> Result<(), SaveError> {
        let _turn = self.shared.write_turn.lock().await;
        loop {
            {
                let mut session = self.shared.session.lock();
                if session.hydrating || session.machine.dirty() == 0 {
                    self.install(&mut session, document, targets);
                    return Ok(());
                }
            }
            self.run_in_turn(SaveTrigger::Flush(FlushReason::ProjectSwitch), None)
                .await?;
        }
    }

    fn install(&self, session: &mut Session, document: ProjectDocument, targets: SaveTargets) {
        session.clear_timer();
        session.document = document;
        session.targets = targets;
        session.hydrating = false;
        let before = session.machine.status();
        session.machine.reset();
        self.publish_change(before, session.machine.status());
    }

    /// Explicit "save now"; writes even when clean.
    pub async fn save_now(&self) -> Result<SaveOutcome, SaveError> {
        self.save(SaveTrigger::Manual).await
    }

    /// Writes to `target` and makes it the destination of later saves.
    pub async fn save_as(&self, target: SaveTarget) -> Result<SaveOutcome, SaveError> {
        self.run(SaveTrigger::SaveAs, Some(target)).await
    }

    /// Queues a save and waits for its outcome.
    pub async fn save(&self, trigger: SaveTrigger) -> Result<SaveOutcome, SaveError> {
        self.run(trigger, None).await
    }

    /// Starts a best-effort lifecycle save without waiting for it.
    pub fn flush(&self, reason: FlushReason) -> JoinHandle<Result<SaveOutcome, SaveError>> {
        info!(
            "event=project_flush module=save status=start reason={}",
            reason.as_str()
        );
        self.spawn_save(SaveTrigger::Flush(reason))
    }

    fn spawn_save(&self, trigger: SaveTrigger) -> JoinHandle<Result<SaveOutcome, SaveError>> {
        let coordinator = self.clone();
        self.shared
            .runtime
            .spawn(async move { coordinator.save(trigger).await })
    }

    fn arm_timer(&self, session: &mut Session, delay: Duration) {
        session.clear_timer();
        let coordinator = self.clone();
        session.pending_timer = Some(self.shared.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so clearing this timer can never cancel the write.
            coordinator.spawn_save(SaveTrigger::Debounce);
        }));
    }

    async fn run(
        &self,
        trigger: SaveTrigger,
        explicit_target: Option<SaveTarget>,
    ) -> Result<SaveOutcome, SaveError> {
        let _turn = self.shared.write_turn.lock().await;
        self.run_in_turn(trigger, explicit_target).await
    }

    /// Body of `run`; the caller holds the write turn.
    async fn run_in_turn(
        &self,
        trigger: SaveTrigger,
        explicit_target: Option<SaveTarget>,
    ) -> Result<SaveOutcome, SaveError> {
        let job = {
            let mut session = self.shared.session.lock();
            if trigger.supersedes_timer() {
                session.clear_timer();
            }
            if let Some(reason) = session.skip_reason(trigger) {
                debug!(
                    "event=project_save module=save status=skipped trigger={} reason={:?}",
                    trigger, reason
                );
                return Ok(SaveOutcome::Skipped(reason));
            }

            let target = explicit_target
                .clone()
                .unwrap_or_else(|| session.targets.resolve(&session.document));
            let before = session.machine.status();
            let ticket = session.machine.begin_save();
            self.publish_change(before, session.machine.status());
            WriteJob {
                ticket,
                target,
                snapshot: session.document.clone(),
            }
        };

        self.write(job, trigger, explicit_target.is_some()).await
    }

    async fn write(
        &self,
        job: WriteJob,
        trigger: SaveTrigger,
        retarget: bool,
    ) -> Result<SaveOutcome, SaveError> {
        let started_at = Instant::now();
        info!(
            "event=project_save module=save status=start trigger={} observed={} target={}",
            trigger,
            job.ticket.observed(),
            target_kind(&job.target)
        );

        let result = match &job.target {
            SaveTarget::Path(path) => {
                self.shared
                    .store
                    .write_project_by_path(path, &job.snapshot)
                    .await
            }
            SaveTarget::ProjectId(id) => {
                self.shared
                    .store
                    .write_project_by_id(id, &job.snapshot)
                    .await
            }
        };

        let written = match result {
            Ok(path) => path,
            Err(err) => {
                let dirty = {
                    let mut session = self.shared.session.lock();
                    let before = session.machine.status();
                    session.machine.complete_failure(job.ticket);
                    self.publish_change(before, session.machine.status());
                    session.machine.dirty()
                };
                error!(
                    "event=project_save module=save status=error trigger={} observed={} dirty={} duration_ms={} error={}",
                    trigger,
                    job.ticket.observed(),
                    dirty,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(SaveError::Store(err));
            }
        };

        let completion = {
            let mut session = self.shared.session.lock();
            if retarget {
                session.targets.retarget(&job.target);
            }
            session.targets.remember(&job.target, &written);
            let before = session.machine.status();
            let completion = session.machine.complete_success(job.ticket);
            self.publish_change(before, session.machine.status());
            if let Completion::Behind { .. } = completion {
                self.arm_timer(&mut session, self.shared.config.catch_up_delay);
            }
            completion
        };

        info!(
            "event=project_save module=save status=ok trigger={} observed={} behind={} duration_ms={}",
            trigger,
            job.ticket.observed(),
            matches!(completion, Completion::Behind { .. }),
            started_at.elapsed().as_millis()
        );

        if matches!(job.target, SaveTarget::Path(_)) && job.snapshot.settings.text_backup {
            self.write_text_backup(&written, &job.snapshot).await;
        }

        Ok(match completion {
            Completion::Saved => SaveOutcome::Saved { path: written },
            Completion::Behind { dirty } => SaveOutcome::Behind {
                path: written,
                dirty,
            },
        })
    }

    async fn write_text_backup(&self, project_path: &Path, snapshot: &ProjectDocument) {
        match self
            .shared
            .store
            .write_text_backup(project_path, &snapshot.manuscript)
            .await
        {
            Ok(path) => debug!(
                "event=text_backup module=save status=ok path={}",
                path.display()
            ),
            Err(err) => warn!(
                "event=text_backup module=save status=error error={}",
                err
            ),
        }
    }

    fn publish_change(&self, before: SaveStatus, after: SaveStatus) {
        if before == after {
            return;
        }
        debug!(
            "event=save_status module=save from={:?} to={:?}",
            before, after
        );
        // No subscribers is fine.
        let _ = self.shared.status_events.send(after);
    }
}

fn target_kind(target: &SaveTarget) -> &'static str {
    match target {
        SaveTarget::Path(_) => "path",
        SaveTarget::ProjectId(_) => "slot",
    }
}
