use async_trait::async_trait;
use seymour_core::{
    Chapter, CoordinatorConfig, FlushReason, ProjectDocument, ProjectStore, ProjectSummary,
    ProjectUpdate, SaveCoordinator, SaveOutcome, SaveStatus, SaveTarget, SaveTargets,
    SkipReason, StoreError, StoreResult, UpdateOptions,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone)]
struct RecordedWrite {
    target: SaveTarget,
    document: ProjectDocument,
    started_at: Instant,
}

/// In-memory store that records every write and can be slowed or failed.
#[derive(Default)]
struct RecordingStore {
    delay: Duration,
    fail_writes: AtomicBool,
    fail_backups: AtomicBool,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    backups: AtomicUsize,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl RecordingStore {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    async fn record(&self, target: SaveTarget, document: &ProjectDocument) -> StoreResult<()> {
        let started_at = Instant::now();
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("/mock"),
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        self.writes.lock().unwrap().push(RecordedWrite {
            target,
            document: document.clone(),
            started_at,
        });
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for RecordingStore {
    async fn write_project_by_path(
        &self,
        path: &Path,
        document: &ProjectDocument,
    ) -> StoreResult<PathBuf> {
        self.record(SaveTarget::Path(path.to_path_buf()), document)
            .await?;
        Ok(path.to_path_buf())
    }

    async fn write_project_by_id(
        &self,
        id: &str,
        document: &ProjectDocument,
    ) -> StoreResult<PathBuf> {
        self.record(SaveTarget::ProjectId(id.to_string()), document)
            .await?;
        Ok(PathBuf::from(format!("/slots/{id}.json")))
    }

    async fn read_project_by_path(&self, path: &Path) -> StoreResult<Vec<u8>> {
        Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "not stored"),
        })
    }

    async fn read_project_by_id(&self, id: &str) -> StoreResult<Vec<u8>> {
        Err(StoreError::InvalidProjectId(id.to_string()))
    }

    async fn list_project_summaries(&self) -> StoreResult<Vec<ProjectSummary>> {
        Ok(Vec::new())
    }

    async fn write_text_backup(
        &self,
        project_path: &Path,
        _chapters: &[Chapter],
    ) -> StoreResult<PathBuf> {
        if self.fail_backups.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: project_path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.backups.fetch_add(1, Ordering::SeqCst);
        Ok(project_path.with_extension("backup.txt"))
    }
}

fn hydrated(store: &Arc<RecordingStore>, document: ProjectDocument) -> SaveCoordinator {
    let coordinator = SaveCoordinator::new(
        store.clone(),
        CoordinatorConfig::default(),
        Handle::current(),
    );
    coordinator.hydrate(document, SaveTargets::for_slot("slot-1"));
    coordinator
}

fn append_note(coordinator: &SaveCoordinator, text: &str) -> u64 {
    let text = text.to_string();
    coordinator.set_project_data(
        ProjectUpdate::edit(move |doc| doc.notes.push_str(&text)),
        UpdateOptions::default(),
    )
}

fn drain(events: &mut broadcast::Receiver<SaveStatus>) -> Vec<SaveStatus> {
    let mut seen = Vec::new();
    while let Ok(status) = events.try_recv() {
        seen.push(status);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn burst_within_one_window_produces_one_write() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = hydrated(&store, ProjectDocument::new("Burst"));

    for index in 0..10 {
        assert_eq!(append_note(&coordinator, &index.to_string()), index + 1);
    }
    assert_eq!(coordinator.status(), SaveStatus::Unsaved);

    sleep(Duration::from_millis(800)).await;

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].document.notes, "0123456789");
    assert_eq!(writes[0].target, SaveTarget::ProjectId("slot-1".to_string()));
    assert_eq!(coordinator.dirty_count(), 0);
    assert_eq!(coordinator.status(), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn continuous_typing_saves_once_after_last_keystroke() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = hydrated(&store, ProjectDocument::new("Typing"));
    let mut events = coordinator.subscribe();
    let started = Instant::now();

    for _ in 0..50 {
        append_note(&coordinator, "x");
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(store.write_count(), 0);

    sleep(Duration::from_millis(700)).await;

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    let fired_after = writes[0].started_at - started;
    assert!(
        fired_after >= Duration::from_millis(5590) && fired_after <= Duration::from_millis(5610),
        "write fired at {fired_after:?}"
    );
    assert_eq!(writes[0].document.notes.len(), 50);
    assert_eq!(
        drain(&mut events),
        vec![SaveStatus::Unsaved, SaveStatus::Saving, SaveStatus::Saved]
    );
}

#[tokio::test(start_paused = true)]
async fn edits_during_write_trigger_catch_up_save() {
    let store = Arc::new(RecordingStore::with_delay(Duration::from_millis(300)));
    let coordinator = hydrated(&store, ProjectDocument::new("Race"));
    let mut events = coordinator.subscribe();
    let started = Instant::now();

    append_note(&coordinator, "a");
    // Debounce fires at 700ms; the write runs until 1000ms.
    sleep(Duration::from_millis(750)).await;
    assert_eq!(coordinator.status(), SaveStatus::Saving);
    append_note(&coordinator, "b");
    sleep(Duration::from_millis(30)).await;
    append_note(&coordinator, "c");
    assert_eq!(coordinator.status(), SaveStatus::Saving);

    sleep(Duration::from_millis(670)).await; // t = 1450ms
    assert_eq!(store.write_count(), 1);
    assert_eq!(coordinator.status(), SaveStatus::Unsaved);
    assert_eq!(coordinator.dirty_count(), 3);

    sleep(Duration::from_millis(400)).await; // t = 1850ms
    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].document.notes, "a");
    assert_eq!(writes[1].document.notes, "abc");
    let catch_up_after = writes[1].started_at - started;
    assert!(
        catch_up_after <= Duration::from_millis(1510),
        "catch-up write started at {catch_up_after:?}"
    );
    assert_eq!(coordinator.status(), SaveStatus::Saved);
    assert_eq!(
        drain(&mut events),
        vec![
            SaveStatus::Unsaved,
            SaveStatus::Saving,
            SaveStatus::Unsaved,
            SaveStatus::Saving,
            SaveStatus::Saved,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_writes_never_report_saved() {
    let store = Arc::new(RecordingStore::default());
    store.fail_writes.store(true, Ordering::SeqCst);
    let coordinator = hydrated(&store, ProjectDocument::new("Doomed"));
    let mut events = coordinator.subscribe();

    for word in ["one ", "two ", "three "] {
        append_note(&coordinator, word);
        sleep(Duration::from_millis(800)).await;
        assert_eq!(coordinator.status(), SaveStatus::Unsaved);
    }

    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(coordinator.dirty_count(), 3);
    assert_eq!(coordinator.document().notes, "one two three ");
    assert!(!drain(&mut events).contains(&SaveStatus::Saved));
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_retried_with_newer_data() {
    let store = Arc::new(RecordingStore::default());
    store.fail_writes.store(true, Ordering::SeqCst);
    let coordinator = hydrated(&store, ProjectDocument::new("Retry"));

    append_note(&coordinator, "first");
    sleep(Duration::from_millis(800)).await;
    assert_eq!(coordinator.dirty_count(), 1);
    assert!(coordinator.save_now().await.is_err());
    assert_eq!(coordinator.dirty_count(), 1);
    assert_eq!(coordinator.status(), SaveStatus::Unsaved);

    store.fail_writes.store(false, Ordering::SeqCst);
    append_note(&coordinator, " second");
    sleep(Duration::from_millis(800)).await;

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].document.notes, "first second");
    assert_eq!(coordinator.dirty_count(), 0);
    assert_eq!(coordinator.status(), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn coinciding_triggers_keep_one_write_in_flight() {
    let store = Arc::new(RecordingStore::with_delay(Duration::from_millis(200)));
    let coordinator = hydrated(&store, ProjectDocument::new("Crowd"));

    append_note(&coordinator, "edit");
    let hidden = coordinator.flush(FlushReason::WindowHidden);
    let closing = coordinator.flush(FlushReason::AppClosing);
    let manual = coordinator.save_now();
    let manual_outcome = manual.await.unwrap();
    let hidden_outcome = hidden.await.unwrap().unwrap();
    let closing_outcome = closing.await.unwrap().unwrap();

    sleep(Duration::from_millis(1000)).await;

    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(matches!(manual_outcome, SaveOutcome::Saved { .. }));
    let skipped = [&hidden_outcome, &closing_outcome]
        .iter()
        .filter(|outcome| matches!(outcome, SaveOutcome::Skipped(SkipReason::Clean)))
        .count();
    assert!(skipped >= 1);
    assert!(store.write_count() <= 2);
    assert_eq!(coordinator.status(), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn flushes_clear_the_debounce_timer() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = hydrated(&store, ProjectDocument::new("Flush"));

    append_note(&coordinator, "edit");
    let first = coordinator.flush(FlushReason::NavigateAway);
    let second = coordinator.flush(FlushReason::AppClosing);
    let outcomes = [
        first.await.unwrap().unwrap(),
        second.await.unwrap().unwrap(),
    ];
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| matches!(outcome, SaveOutcome::Saved { .. }))
            .count(),
        1
    );
    assert!(outcomes.contains(&SaveOutcome::Skipped(SkipReason::Clean)));

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(store.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_auto_save_waits_for_manual_save() {
    let store = Arc::new(RecordingStore::default());
    let mut document = ProjectDocument::new("Manual");
    document.settings.auto_save = false;
    let coordinator = hydrated(&store, document);

    append_note(&coordinator, "draft");
    sleep(Duration::from_millis(800)).await;
    assert_eq!(store.write_count(), 0);
    assert_eq!(coordinator.status(), SaveStatus::Unsaved);

    let outcome = coordinator.save_now().await.unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            path: PathBuf::from("/slots/slot-1.json")
        }
    );
    assert_eq!(coordinator.status(), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn hydration_and_skip_dirty_do_not_mark_dirty() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = SaveCoordinator::new(
        store.clone(),
        CoordinatorConfig::default(),
        Handle::current(),
    );

    assert!(coordinator.is_hydrating());
    assert_eq!(append_note(&coordinator, "loading"), 0);
    coordinator.finish_hydration();

    let loaded = ProjectDocument::new("Loaded");
    assert_eq!(
        coordinator.set_project_data(loaded, UpdateOptions::skip_dirty()),
        0
    );
    sleep(Duration::from_millis(800)).await;

    assert_eq!(store.write_count(), 0);
    assert_eq!(coordinator.document().title, "Loaded");
    assert_eq!(coordinator.status(), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn directory_saves_pin_path_and_write_text_backup() {
    let store = Arc::new(RecordingStore::default());
    let mut document = ProjectDocument::new("Salt");
    document.directory = Some("/books".to_string());
    let coordinator = hydrated(&store, document);

    append_note(&coordinator, "x");
    sleep(Duration::from_millis(800)).await;
    coordinator.set_project_data(
        ProjectUpdate::edit(|doc| doc.title = "Brine".to_string()),
        UpdateOptions::default(),
    );
    sleep(Duration::from_millis(800)).await;

    let expected = SaveTarget::Path(PathBuf::from("/books/Salt.seymour"));
    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().all(|write| write.target == expected));
    assert_eq!(store.backups.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn backup_failure_does_not_fail_the_save() {
    let store = Arc::new(RecordingStore::default());
    store.fail_backups.store(true, Ordering::SeqCst);
    let mut document = ProjectDocument::new("Fragile");
    document.directory = Some("/books".to_string());
    let coordinator = hydrated(&store, document);

    append_note(&coordinator, "x");
    let outcome = coordinator.save_now().await.unwrap();

    assert!(matches!(outcome, SaveOutcome::Saved { .. }));
    assert_eq!(coordinator.status(), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn save_as_redirects_later_autosaves() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = hydrated(&store, ProjectDocument::new("Moved"));
    let destination = PathBuf::from("/exports/moved.seymour");

    let outcome = coordinator
        .save_as(SaveTarget::Path(destination.clone()))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            path: destination.clone()
        }
    );

    append_note(&coordinator, "after");
    sleep(Duration::from_millis(800)).await;

    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].target, SaveTarget::Path(destination.clone()));
    assert_eq!(coordinator.current_target(), SaveTarget::Path(destination));
}

#[tokio::test(start_paused = true)]
async fn replace_document_writes_pending_edits_before_swapping() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = hydrated(&store, ProjectDocument::new("Old"));

    append_note(&coordinator, "unsaved");
    coordinator
        .replace_document(ProjectDocument::new("New"), SaveTargets::for_slot("slot-2"))
        .await
        .unwrap();
    sleep(Duration::from_millis(800)).await;

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].target, SaveTarget::ProjectId("slot-1".to_string()));
    assert_eq!(writes[0].document.notes, "unsaved");
    assert_eq!(coordinator.document().title, "New");
    assert_eq!(coordinator.dirty_count(), 0);
    assert_eq!(coordinator.status(), SaveStatus::Saved);
    assert_eq!(
        coordinator.current_target(),
        SaveTarget::ProjectId("slot-2".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn replace_document_keeps_project_when_pending_write_fails() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = hydrated(&store, ProjectDocument::new("Old"));
    store.fail_writes.store(true, Ordering::SeqCst);

    append_note(&coordinator, "unsaved");
    let result = coordinator
        .replace_document(ProjectDocument::new("New"), SaveTargets::for_slot("slot-2"))
        .await;

    assert!(result.is_err());
    assert_eq!(coordinator.document().title, "Old");
    assert_eq!(coordinator.document().notes, "unsaved");
    assert_eq!(coordinator.dirty_count(), 1);
    assert_eq!(
        coordinator.current_target(),
        SaveTarget::ProjectId("slot-1".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn replace_document_of_clean_project_writes_nothing() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = hydrated(&store, ProjectDocument::new("Old"));

    coordinator
        .replace_document(ProjectDocument::new("New"), SaveTargets::for_slot("slot-2"))
        .await
        .unwrap();

    assert_eq!(store.write_count(), 0);
    assert_eq!(coordinator.document().title, "New");
}
