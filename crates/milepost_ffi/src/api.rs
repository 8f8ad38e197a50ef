//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level milestone functions to Dart via FRB.
//! - Keep error semantics simple for UI integration: every call returns an
//!   envelope, never an exception.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Attributes cross the boundary as JSON object strings.

use log::info;
use milepost_core::db::open_db;
use milepost_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Attributes, HistoryEntry, Milestone, MilestoneService, Operation, ServiceError, Snapshot,
    SqliteHistoryLog, SqliteMilestoneStore,
};
use std::path::PathBuf;
use std::sync::OnceLock;

const DB_FILE_NAME: &str = "milepost.sqlite3";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

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
/// - Never panics; returns empty string on success and error message on
///   failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Milestone projection returned to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneView {
    /// Identity key.
    pub title: String,
    /// Attributes as a JSON object string, order preserved.
    pub attributes_json: String,
    /// Contiguous rank within the collection.
    pub position: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms of the last edit/rename.
    pub updated_at: i64,
}

/// History entry projection for the history screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntryView {
    /// Strictly increasing log position.
    pub sequence_number: i64,
    /// Operation label (`create|edit|delete|reorder|restore`).
    pub operation: String,
    /// Affected milestone title, or `collection` for whole-collection
    /// entries.
    pub subject: String,
    /// Epoch ms append timestamp.
    pub recorded_at: i64,
}

/// Response envelope for single-milestone commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneActionResponse {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Affected milestone on success.
    pub milestone: Option<MilestoneView>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl MilestoneActionResponse {
    fn success(message: impl Into<String>, milestone: &Milestone) -> Self {
        Self {
            ok: true,
            milestone: Some(to_milestone_view(milestone)),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            milestone: None,
            message: message.into(),
        }
    }
}

/// Response envelope for commands yielding a full collection listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneListResponse {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Collection in ascending position order (empty on failure).
    pub items: Vec<MilestoneView>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl MilestoneListResponse {
    fn success(message: impl Into<String>, milestones: &[Milestone]) -> Self {
        Self {
            ok: true,
            items: milestones.iter().map(to_milestone_view).collect(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            message: message.into(),
        }
    }
}

/// Response envelope for history listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryListResponse {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Entries in ascending sequence order (empty on failure).
    pub items: Vec<HistoryEntryView>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

/// Creates a milestone at the end of the collection.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - `attributes_json` must be a JSON object string or empty/absent.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn milestone_create(title: String, attributes_json: Option<String>) -> MilestoneActionResponse {
    let attributes = match parse_attributes_json(attributes_json) {
        Ok(attributes) => attributes,
        Err(message) => return MilestoneActionResponse::failure(message),
    };
    match with_service(|service| service.create(title.as_str(), attributes)) {
        Ok(milestone) => MilestoneActionResponse::success("Milestone created.", &milestone),
        Err(err) => MilestoneActionResponse::failure(format!("milestone_create failed: {err}")),
    }
}

/// Replaces the attributes of an existing milestone.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - `attributes_json` must be a JSON object string or empty/absent.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn milestone_edit(title: String, attributes_json: Option<String>) -> MilestoneActionResponse {
    let attributes = match parse_attributes_json(attributes_json) {
        Ok(attributes) => attributes,
        Err(message) => return MilestoneActionResponse::failure(message),
    };
    match with_service(|service| service.edit(title.as_str(), attributes)) {
        Ok(milestone) => MilestoneActionResponse::success("Milestone updated.", &milestone),
        Err(err) => MilestoneActionResponse::failure(format!("milestone_edit failed: {err}")),
    }
}

/// Renames an existing milestone, preserving position and attributes.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn milestone_rename(old_title: String, new_title: String) -> MilestoneActionResponse {
    match with_service(|service| service.rename(old_title.as_str(), new_title.as_str())) {
        Ok(milestone) => MilestoneActionResponse::success("Milestone renamed.", &milestone),
        Err(err) => MilestoneActionResponse::failure(format!("milestone_rename failed: {err}")),
    }
}

/// Deletes a milestone and closes the position gap it leaves.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn milestone_delete(title: String) -> MilestoneActionResponse {
    match with_service(|service| service.delete(title.as_str())) {
        Ok(milestone) => MilestoneActionResponse::success("Milestone deleted.", &milestone),
        Err(err) => MilestoneActionResponse::failure(format!("milestone_delete failed: {err}")),
    }
}

/// Moves a milestone to a new rank and returns the resulting ordering.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn milestone_reorder(title: String, new_position: i64) -> MilestoneListResponse {
    match with_service(|service| service.reorder(title.as_str(), new_position)) {
        Ok(ordered) => MilestoneListResponse::success("Milestone moved.", &ordered),
        Err(err) => MilestoneListResponse::failure(format!("milestone_reorder failed: {err}")),
    }
}

/// Lists the live collection in ascending position order.
///
/// # FFI contract
/// - Sync call, DB-backed execution; read-only.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn milestones_list() -> MilestoneListResponse {
    match with_service(|service| service.list()) {
        Ok(milestones) => {
            let message = if milestones.is_empty() {
                "No milestones.".to_string()
            } else {
                format!("Found {} milestone(s).", milestones.len())
            };
            MilestoneListResponse::success(message, &milestones)
        }
        Err(err) => MilestoneListResponse::failure(format!("milestones_list failed: {err}")),
    }
}

/// Lists history entries, optionally restricted to `sequence_number >
/// since`.
///
/// # FFI contract
/// - Sync call, DB-backed execution; read-only.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn history_list(since: Option<i64>) -> HistoryListResponse {
    match with_service(|service| service.history(since)) {
        Ok(entries) => HistoryListResponse {
            ok: true,
            items: entries.iter().map(to_history_entry_view).collect(),
            message: format!("Found {} history entrie(s).", entries.len()),
        },
        Err(err) => HistoryListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("history_list failed: {err}"),
        },
    }
}

/// Reconstructs a past collection state without applying it.
///
/// # FFI contract
/// - Sync call, DB-backed execution; read-only.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn history_revert_preview(sequence_number: i64) -> MilestoneListResponse {
    match with_service(|service| service.revert_preview(sequence_number)) {
        Ok(milestones) => MilestoneListResponse::success("Revert preview ready.", &milestones),
        Err(err) => {
            MilestoneListResponse::failure(format!("history_revert_preview failed: {err}"))
        }
    }
}

/// Reconstructs a past collection state and commits it.
///
/// The commit is recorded as one `restore` history entry.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn history_revert(sequence_number: i64) -> MilestoneListResponse {
    match with_service(|service| service.revert_to(sequence_number)) {
        Ok(milestones) => {
            info!("event=history_revert module=ffi status=ok sequence={sequence_number}");
            MilestoneListResponse::success("Collection reverted.", &milestones)
        }
        Err(err) => MilestoneListResponse::failure(format!("history_revert failed: {err}")),
    }
}

fn parse_attributes_json(attributes_json: Option<String>) -> Result<Attributes, String> {
    let text = match attributes_json {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Ok(Attributes::new()),
    };
    serde_json::from_str::<Attributes>(&text)
        .map_err(|err| format!("attributes must be a JSON object: {err}"))
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("MILEPOST_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn with_service<T>(
    f: impl FnOnce(
        &MilestoneService<SqliteMilestoneStore<'_>, SqliteHistoryLog<'_>>,
    ) -> Result<T, ServiceError>,
) -> Result<T, String> {
    let db_path = resolve_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("milestone DB open failed: {err}"))?;
    let store = SqliteMilestoneStore::try_new(&conn)
        .map_err(|err| format!("milestone store init failed: {err}"))?;
    let history = SqliteHistoryLog::try_new(&conn)
        .map_err(|err| format!("history log init failed: {err}"))?;
    let service = MilestoneService::new(store, history);
    f(&service).map_err(|err| err.to_string())
}

fn to_milestone_view(milestone: &Milestone) -> MilestoneView {
    MilestoneView {
        title: milestone.title.clone(),
        attributes_json: serde_json::to_string(&milestone.attributes)
            .unwrap_or_else(|_| "{}".to_string()),
        position: milestone.position,
        created_at: milestone.created_at,
        updated_at: milestone.updated_at,
    }
}

fn to_history_entry_view(entry: &HistoryEntry) -> HistoryEntryView {
    HistoryEntryView {
        sequence_number: entry.sequence_number,
        operation: operation_label(entry.operation).to_string(),
        subject: entry_subject(entry),
        recorded_at: entry.recorded_at,
    }
}

fn entry_subject(entry: &HistoryEntry) -> String {
    // Prefer the post-state title; deletes only carry a before-state.
    for snapshot in [&entry.after, &entry.before] {
        if let Snapshot::Milestone { milestone } = snapshot {
            return milestone.title.clone();
        }
    }
    "collection".to_string()
}

fn operation_label(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "create",
        Operation::Edit => "edit",
        Operation::Delete => "delete",
        Operation::Reorder => "reorder",
        Operation::Restore => "restore",
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, history_list, init_logging, milestone_create, milestone_delete,
        milestone_reorder, milestones_list, parse_attributes_json, ping,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn parse_attributes_json_accepts_objects_and_absence() {
        assert!(parse_attributes_json(None).unwrap().is_empty());
        assert!(parse_attributes_json(Some("  ".to_string())).unwrap().is_empty());

        let parsed = parse_attributes_json(Some(r#"{"phase": 1}"#.to_string())).unwrap();
        assert_eq!(parsed.get("phase"), Some(&serde_json::json!(1)));

        assert!(parse_attributes_json(Some("[1, 2]".to_string())).is_err());
        assert!(parse_attributes_json(Some("not json".to_string())).is_err());
    }

    #[test]
    fn created_milestone_appears_in_listing() {
        let title = unique_token("ffi-list");
        let created = milestone_create(title.clone(), Some(r#"{"phase": 1}"#.to_string()));
        assert!(created.ok, "{}", created.message);

        let listing = milestones_list();
        assert!(listing.ok, "{}", listing.message);
        assert!(listing.items.iter().any(|item| item.title == title));
    }

    #[test]
    fn duplicate_create_reports_failure_envelope() {
        let title = unique_token("ffi-dup");
        let first = milestone_create(title.clone(), None);
        assert!(first.ok, "{}", first.message);

        let second = milestone_create(title, None);
        assert!(!second.ok);
        assert!(second.message.contains("already in use"));
    }

    #[test]
    fn invalid_attributes_json_reports_failure_envelope() {
        let response = milestone_create(unique_token("ffi-attrs"), Some("[]".to_string()));
        assert!(!response.ok);
        assert!(response.message.contains("JSON object"));
    }

    #[test]
    fn reorder_to_negative_position_reports_failure_envelope() {
        let title = unique_token("ffi-reorder");
        let created = milestone_create(title.clone(), None);
        assert!(created.ok, "{}", created.message);

        let response = milestone_reorder(title, -1);
        assert!(!response.ok);
        assert!(response.message.contains("valid range"));
    }

    #[test]
    fn delete_is_reported_once() {
        let title = unique_token("ffi-delete");
        let created = milestone_create(title.clone(), None);
        assert!(created.ok, "{}", created.message);

        let deleted = milestone_delete(title.clone());
        assert!(deleted.ok, "{}", deleted.message);

        let again = milestone_delete(title);
        assert!(!again.ok);
        assert!(again.message.contains("not found"));
    }

    #[test]
    fn history_records_created_milestones() {
        let title = unique_token("ffi-history");
        let created = milestone_create(title.clone(), None);
        assert!(created.ok, "{}", created.message);

        let history = history_list(None);
        assert!(history.ok, "{}", history.message);
        assert!(history
            .items
            .iter()
            .any(|item| item.operation == "create" && item.subject == title));
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
