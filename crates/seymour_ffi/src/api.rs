//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose project lifecycle and save functions to Dart via FRB.
//! - Own the process-wide runtime and `ProjectService`.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported through response envelopes, never thrown.
//! - One open project per process.

use log::warn;
use seymour_core::{
    core_version as core_version_inner, init_logging as init_logging_inner,
    merge_with_defaults, ping as ping_inner, CoordinatorConfig, FlushReason, FsProjectStore,
    ProjectService, ProjectSource, ProjectSummary, SaveError, SaveOutcome, SaveTarget,
    SkipReason, UpdateOptions,
};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Builder, Runtime};

const PROJECTS_DIR_ENV: &str = "SEYMOUR_PROJECTS_DIR";
const PROJECTS_DIR_NAME: &str = "seymour-projects";
const RUNTIME_THREADS: usize = 2;

static SESSION: OnceLock<Result<FfiSession, String>> = OnceLock::new();

struct FfiSession {
    runtime: Runtime,
    service: ProjectService,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Generic action response envelope for project commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// File written or opened, when the operation touched one.
    pub path: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ProjectActionResponse {
    fn success(message: impl Into<String>, path: Option<String>) -> Self {
        Self {
            ok: true,
            path,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            path: None,
            message: message.into(),
        }
    }
}

/// One autosave slot in the projects directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectListItem {
    pub project_id: String,
    pub title: String,
    /// Last write time in epoch milliseconds.
    pub last_modified_ms: i64,
}

/// Listing response envelope, newest project first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectListResponse {
    pub items: Vec<ProjectListItem>,
    pub message: String,
}

/// Hydrates the session with the last project the host remembers.
///
/// Input semantics:
/// - `last_path` wins over `last_project_id` when both are set.
/// - Both empty starts an empty project.
///
/// # FFI contract
/// - Sync call; blocks on file reads.
/// - A corrupt or missing last project still succeeds (`ok=true`) with the
///   fallback warning as `message`.
#[flutter_rust_bridge::frb(sync)]
pub fn project_startup(
    last_path: Option<String>,
    last_project_id: Option<String>,
) -> ProjectActionResponse {
    let source = source_from(last_path, last_project_id);
    match with_session(|session| session.runtime.block_on(session.service.startup(source))) {
        Ok(None) => ProjectActionResponse::success("Project loaded.", None),
        Ok(Some(warning)) => ProjectActionResponse::success(warning.message, None),
        Err(err) => ProjectActionResponse::failure(format!("project_startup failed: {err}")),
    }
}

/// Lists autosave slots, newest first.
///
/// # FFI contract
/// - Sync call; scans the projects directory.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn project_list() -> ProjectListResponse {
    let listed = with_session(|session| {
        session
            .runtime
            .block_on(session.service.list_projects())
            .map_err(|err| err.to_string())
    })
    .and_then(|result| result);

    match listed {
        Ok(summaries) => {
            let items = summaries
                .into_iter()
                .map(to_list_item)
                .collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No projects.".to_string()
            } else {
                format!("Found {} project(s).", items.len())
            };
            ProjectListResponse { items, message }
        }
        Err(err) => ProjectListResponse {
            items: Vec::new(),
            message: format!("project_list failed: {err}"),
        },
    }
}

/// Opens a project file after flushing the current project.
///
/// # FFI contract
/// - Sync call; blocks on the flush and the read.
/// - On failure the current project stays open.
#[flutter_rust_bridge::frb(sync)]
pub fn project_open_path(path: String) -> ProjectActionResponse {
    let path = path.trim().to_string();
    if path.is_empty() {
        return ProjectActionResponse::failure("project_open_path failed: path is empty");
    }
    open_source(ProjectSource::Path(PathBuf::from(&path)), "project_open_path")
}

/// Opens an autosave slot after flushing the current project.
///
/// # FFI contract
/// - Sync call; blocks on the flush and the read.
/// - On failure the current project stays open.
#[flutter_rust_bridge::frb(sync)]
pub fn project_open_id(project_id: String) -> ProjectActionResponse {
    open_source(
        ProjectSource::Slot(project_id.trim().to_string()),
        "project_open_id",
    )
}

/// Starts a new, unsaved project after flushing the current one.
///
/// # FFI contract
/// - Sync call; blocks on the flush.
/// - Empty titles become `Untitled`.
#[flutter_rust_bridge::frb(sync)]
pub fn project_new(title: String) -> ProjectActionResponse {
    match with_session(|session| {
        session
            .runtime
            .block_on(session.service.new_project(&title))
            .map_err(|err| err.to_string())
    })
    .and_then(|result| result)
    {
        Ok(()) => ProjectActionResponse::success("Project created.", None),
        Err(err) => ProjectActionResponse::failure(format!("project_new failed: {err}")),
    }
}

/// Returns the open project as camelCase JSON.
///
/// # FFI contract
/// - Sync call, in-memory.
/// - Returns an empty string when the session cannot be created.
#[flutter_rust_bridge::frb(sync)]
pub fn project_document_json() -> String {
    with_session(|session| {
        session
            .service
            .coordinator()
            .with_document(serde_json::to_string)
            .map_err(|err| err.to_string())
    })
    .and_then(|result| result)
    .unwrap_or_else(|err| {
        warn!("event=ffi_call module=ffi status=error call=project_document_json error={err}");
        String::new()
    })
}

/// Replaces the open project with `document_json`.
///
/// Input semantics:
/// - `document_json` is merged onto the default document like a loaded file.
/// - `skip_dirty=true` applies the document without scheduling a save.
///
/// # FFI contract
/// - Sync call, non-blocking; the save happens after the debounce window.
/// - Rejected JSON leaves the open project unchanged.
#[flutter_rust_bridge::frb(sync)]
pub fn project_replace_json(document_json: String, skip_dirty: bool) -> ProjectActionResponse {
    let document = match serde_json::from_str(&document_json)
        .map_err(Into::into)
        .and_then(merge_with_defaults)
    {
        Ok(document) => document,
        Err(err) => {
            return ProjectActionResponse::failure(format!("project_replace_json failed: {err}"))
        }
    };
    let options = UpdateOptions { skip_dirty };

    match with_session(|session| session.service.coordinator().set_project_data(document, options))
    {
        Ok(dirty) => ProjectActionResponse::success(format!("Pending changes: {dirty}."), None),
        Err(err) => ProjectActionResponse::failure(format!("project_replace_json failed: {err}")),
    }
}

/// Writes the open project now, even when nothing changed.
///
/// # FFI contract
/// - Sync call; blocks until the write finishes.
/// - Returns the written path on success.
#[flutter_rust_bridge::frb(sync)]
pub fn project_save_now() -> ProjectActionResponse {
    save_response(
        "project_save_now",
        with_session(|session| {
            session
                .runtime
                .block_on(session.service.coordinator().save_now())
        }),
    )
}

/// Writes the open project to `path` and saves there from now on.
///
/// # FFI contract
/// - Sync call; blocks until the write finishes.
#[flutter_rust_bridge::frb(sync)]
pub fn project_save_as(path: String) -> ProjectActionResponse {
    let path = path.trim().to_string();
    if path.is_empty() {
        return ProjectActionResponse::failure("project_save_as failed: path is empty");
    }
    save_response(
        "project_save_as",
        with_session(|session| {
            session.runtime.block_on(
                session
                    .service
                    .coordinator()
                    .save_as(SaveTarget::Path(PathBuf::from(path))),
            )
        }),
    )
}

/// Starts a lifecycle flush.
///
/// Input semantics:
/// - `reason`: one of `window_hidden|app_closing|navigate_away|project_switch`.
/// - `wait=true` blocks until the flush finishes; use it before exit.
///
/// # FFI contract
/// - With `wait=false` the call returns immediately with `ok=true`.
#[flutter_rust_bridge::frb(sync)]
pub fn project_flush(reason: String, wait: bool) -> ProjectActionResponse {
    let Some(reason) = parse_flush_reason(&reason) else {
        return ProjectActionResponse::failure(format!(
            "project_flush failed: unsupported reason `{}`",
            reason.trim()
        ));
    };

    let flushed = with_session(|session| {
        let handle = session.service.coordinator().flush(reason);
        if !wait {
            return None;
        }
        Some(
            session
                .runtime
                .block_on(handle)
                .map_err(|err| format!("flush task failed: {err}")),
        )
    });

    match flushed {
        Ok(None) => ProjectActionResponse::success("Flush started.", None),
        Ok(Some(Ok(result))) => save_response("project_flush", Ok(result)),
        Ok(Some(Err(err))) | Err(err) => {
            ProjectActionResponse::failure(format!("project_flush failed: {err}"))
        }
    }
}

/// Save indicator label: `Saved`, `Unsaved changes...` or `Saving...`.
///
/// # FFI contract
/// - Sync call, in-memory.
#[flutter_rust_bridge::frb(sync)]
pub fn project_save_status() -> String {
    with_session(|session| session.service.coordinator().status().label().to_string())
        .unwrap_or_else(|err| format!("Unavailable: {err}"))
}

/// Mutations not yet covered by a successful write.
///
/// # FFI contract
/// - Sync call, in-memory; `0` when the session cannot be created.
#[flutter_rust_bridge::frb(sync)]
pub fn project_dirty_count() -> u64 {
    with_session(|session| session.service.coordinator().dirty_count()).unwrap_or(0)
}

fn open_source(source: ProjectSource, call: &str) -> ProjectActionResponse {
    let path = match &source {
        ProjectSource::Path(path) => Some(path.display().to_string()),
        ProjectSource::Slot(_) => None,
    };
    match with_session(|session| {
        session
            .runtime
            .block_on(session.service.open(source))
            .map_err(|err| err.to_string())
    })
    .and_then(|result| result)
    {
        Ok(()) => ProjectActionResponse::success("Project opened.", path),
        Err(err) => ProjectActionResponse::failure(format!("{call} failed: {err}")),
    }
}

fn save_response(
    call: &str,
    result: Result<Result<SaveOutcome, SaveError>, String>,
) -> ProjectActionResponse {
    match result {
        Ok(Ok(SaveOutcome::Saved { path })) => {
            ProjectActionResponse::success("Saved.", Some(path.display().to_string()))
        }
        Ok(Ok(SaveOutcome::Behind { path, dirty })) => ProjectActionResponse::success(
            format!("Saved; {dirty} newer change(s) pending."),
            Some(path.display().to_string()),
        ),
        Ok(Ok(SaveOutcome::Skipped(reason))) => {
            ProjectActionResponse::success(skip_message(reason), None)
        }
        Ok(Err(err)) => ProjectActionResponse::failure(format!("{call} failed: {err}")),
        Err(err) => ProjectActionResponse::failure(format!("{call} failed: {err}")),
    }
}

fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Clean => "Nothing to save.",
        SkipReason::AutoSaveDisabled => "Auto-save is off.",
        SkipReason::Hydrating => "Project is still loading.",
    }
}

fn parse_flush_reason(raw: &str) -> Option<FlushReason> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "window_hidden" => Some(FlushReason::WindowHidden),
        "app_closing" => Some(FlushReason::AppClosing),
        "navigate_away" => Some(FlushReason::NavigateAway),
        "project_switch" => Some(FlushReason::ProjectSwitch),
        _ => None,
    }
}

fn source_from(last_path: Option<String>, last_project_id: Option<String>) -> Option<ProjectSource> {
    let non_empty = |raw: Option<String>| {
        raw.map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    non_empty(last_path)
        .map(|path| ProjectSource::Path(PathBuf::from(path)))
        .or_else(|| non_empty(last_project_id).map(ProjectSource::Slot))
}

fn to_list_item(summary: ProjectSummary) -> ProjectListItem {
    ProjectListItem {
        project_id: summary.id,
        title: summary.title,
        last_modified_ms: summary.last_modified,
    }
}

fn with_session<T>(f: impl FnOnce(&FfiSession) -> T) -> Result<T, String> {
    match SESSION.get_or_init(build_session) {
        Ok(session) => Ok(f(session)),
        Err(err) => Err(err.clone()),
    }
}

fn build_session() -> Result<FfiSession, String> {
    let runtime = Builder::new_multi_thread()
        .worker_threads(RUNTIME_THREADS)
        .thread_name("seymour-save")
        .enable_all()
        .build()
        .map_err(|err| format!("runtime init failed: {err}"))?;
    let store = Arc::new(FsProjectStore::new(resolve_projects_dir()));
    let service = ProjectService::new(store, CoordinatorConfig::default(), runtime.handle().clone());
    Ok(FfiSession { runtime, service })
}

fn resolve_projects_dir() -> PathBuf {
    if let Ok(raw) = std::env::var(PROJECTS_DIR_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(PROJECTS_DIR_NAME)
}
