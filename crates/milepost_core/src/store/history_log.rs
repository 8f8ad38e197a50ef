//! History log contracts and SQLite implementation.
//!
//! # Responsibility
//! - Record every committed store mutation as an immutable entry.
//! - Reconstruct prior collection states by inverse replay, without
//!   mutating anything.
//!
//! # Invariants
//! - `sequence_number` is assigned as max+1 inside the mutation's own
//!   transaction: strictly increasing, gapless, never reused.
//! - `recorded_at` never decreases across entries, even if the wall clock
//!   steps backwards.
//! - `revert_to` is a pure read; committing a revert is the caller's job
//!   (`MilestoneStore::restore`).

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::history::{HistoryEntry, Operation, OrderingSlot, Snapshot};
use crate::model::milestone::{check_collection, now_epoch_ms, Milestone};
use crate::store::milestone_store::{load_collection, StoreError};
use crate::store::{schema_version, table_exists, table_has_column};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ENTRY_SELECT_SQL: &str = "SELECT
    sequence_number,
    operation,
    before_snapshot,
    after_snapshot,
    recorded_at
FROM history_entries";

pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors from history log operations.
#[derive(Debug)]
pub enum HistoryError {
    /// Revert target sequence number is not present in the log.
    InvalidSequenceNumber(i64),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model, or replay
    /// produced an inconsistent intermediate state.
    InvalidData(String),
}

impl Display for HistoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSequenceNumber(sequence_number) => {
                write!(f, "history entry not found: sequence {sequence_number}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "history log requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "history log requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "history log requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid history data: {message}"),
        }
    }
}

impl Error for HistoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for HistoryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for HistoryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// History log interface for external callers.
///
/// Appending is intentionally absent: only the store writes entries, from
/// inside its own transactions.
pub trait HistoryLog {
    /// Lists entries in ascending `sequence_number` order, optionally
    /// filtered to `sequence_number > since`. Restartable: the log is
    /// immutable once written, so re-querying yields the same result.
    fn list_entries(&self, since: Option<i64>) -> HistoryResult<Vec<HistoryEntry>>;
    /// Reconstructs the collection state as it existed immediately after
    /// the target entry committed, by applying the before-state of every
    /// newer entry to a working copy of the live collection. Pure read.
    fn revert_to(&self, sequence_number: i64) -> HistoryResult<Vec<Milestone>>;
}

/// SQLite-backed history log.
pub struct SqliteHistoryLog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryLog<'conn> {
    /// Creates a log reader from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> HistoryResult<Self> {
        ensure_history_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl HistoryLog for SqliteHistoryLog<'_> {
    fn list_entries(&self, since: Option<i64>) -> HistoryResult<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        match since {
            Some(since) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{ENTRY_SELECT_SQL}
                     WHERE sequence_number > ?1
                     ORDER BY sequence_number ASC;"
                ))?;
                let mut rows = stmt.query([since])?;
                while let Some(row) = rows.next()? {
                    entries.push(parse_entry_row(row)?);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{ENTRY_SELECT_SQL} ORDER BY sequence_number ASC;"))?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    entries.push(parse_entry_row(row)?);
                }
            }
        }
        Ok(entries)
    }

    fn revert_to(&self, sequence_number: i64) -> HistoryResult<Vec<Milestone>> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM history_entries WHERE sequence_number = ?1
            );",
            [sequence_number],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(HistoryError::InvalidSequenceNumber(sequence_number));
        }

        let mut working = load_collection(self.conn).map_err(lift_store_error)?;

        // Newest first: each step undoes exactly one committed mutation.
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE sequence_number > ?1
             ORDER BY sequence_number DESC;"
        ))?;
        let mut rows = stmt.query([sequence_number])?;
        while let Some(row) = rows.next()? {
            let entry = parse_entry_row(row)?;
            undo_entry(&mut working, &entry)?;
        }

        working.sort_by_key(|milestone| milestone.position);
        check_collection(&working).map_err(|message| {
            HistoryError::InvalidData(format!(
                "replay to sequence {sequence_number} produced inconsistent state: {message}"
            ))
        })?;
        Ok(working)
    }
}

/// Appends one entry for a mutation that is about to commit.
///
/// Called by the store inside the mutation's transaction, so the entry and
/// the state change become visible together or not at all.
pub(crate) fn append_entry(
    conn: &Connection,
    operation: Operation,
    before: &Snapshot,
    after: &Snapshot,
) -> HistoryResult<HistoryEntry> {
    let (next_sequence, last_recorded_at): (i64, i64) = conn.query_row(
        "SELECT COALESCE(MAX(sequence_number), 0) + 1,
                COALESCE(MAX(recorded_at), 0)
         FROM history_entries;",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let entry = HistoryEntry {
        sequence_number: next_sequence,
        operation,
        before: before.clone(),
        after: after.clone(),
        // Clamp against the previous entry so the column stays monotonic
        // even when the wall clock steps backwards.
        recorded_at: now_epoch_ms().max(last_recorded_at),
    };
    conn.execute(
        "INSERT INTO history_entries (
            sequence_number,
            operation,
            before_snapshot,
            after_snapshot,
            recorded_at
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            entry.sequence_number,
            operation_to_db(entry.operation),
            serialize_snapshot(&entry.before)?,
            serialize_snapshot(&entry.after)?,
            entry.recorded_at,
        ],
    )?;
    Ok(entry)
}

fn undo_entry(working: &mut Vec<Milestone>, entry: &HistoryEntry) -> HistoryResult<()> {
    match (entry.operation, &entry.before, &entry.after) {
        (Operation::Create, Snapshot::Empty, Snapshot::Milestone { milestone }) => {
            let index = index_of_title(working, &milestone.title, entry)?;
            let removed = working.remove(index);
            for item in working.iter_mut() {
                if item.position > removed.position {
                    item.position -= 1;
                }
            }
        }
        (
            Operation::Edit,
            Snapshot::Milestone { milestone: before },
            Snapshot::Milestone { milestone: after },
        ) => {
            let index = index_of_title(working, &after.title, entry)?;
            working[index] = before.clone();
        }
        (Operation::Delete, Snapshot::Milestone { milestone }, Snapshot::Empty) => {
            for item in working.iter_mut() {
                if item.position >= milestone.position {
                    item.position += 1;
                }
            }
            working.push(milestone.clone());
        }
        (Operation::Reorder, Snapshot::Ordering { slots }, Snapshot::Ordering { .. }) => {
            apply_ordering(working, slots, entry)?;
        }
        (Operation::Restore, Snapshot::Collection { milestones }, Snapshot::Collection { .. }) => {
            *working = milestones.clone();
        }
        _ => {
            return Err(HistoryError::InvalidData(format!(
                "entry {} has snapshots inconsistent with operation `{}`",
                entry.sequence_number,
                operation_to_db(entry.operation)
            )));
        }
    }
    Ok(())
}

fn apply_ordering(
    working: &mut [Milestone],
    slots: &[OrderingSlot],
    entry: &HistoryEntry,
) -> HistoryResult<()> {
    for slot in slots {
        let index = index_of_title(working, &slot.title, entry)?;
        working[index].position = slot.position;
    }
    Ok(())
}

fn index_of_title(
    working: &[Milestone],
    title: &str,
    entry: &HistoryEntry,
) -> HistoryResult<usize> {
    working
        .iter()
        .position(|milestone| milestone.title == title)
        .ok_or_else(|| {
            HistoryError::InvalidData(format!(
                "entry {}: milestone `{title}` missing during replay",
                entry.sequence_number
            ))
        })
}

fn lift_store_error(err: StoreError) -> HistoryError {
    match err {
        StoreError::Db(inner) => HistoryError::Db(inner),
        other => HistoryError::InvalidData(other.to_string()),
    }
}

fn parse_entry_row(row: &Row<'_>) -> HistoryResult<HistoryEntry> {
    let operation_text: String = row.get("operation")?;
    let operation = parse_operation(&operation_text).ok_or_else(|| {
        HistoryError::InvalidData(format!(
            "invalid operation `{operation_text}` in history_entries.operation"
        ))
    })?;

    let before_text: String = row.get("before_snapshot")?;
    let after_text: String = row.get("after_snapshot")?;
    Ok(HistoryEntry {
        sequence_number: row.get("sequence_number")?,
        operation,
        before: parse_snapshot(&before_text, "history_entries.before_snapshot")?,
        after: parse_snapshot(&after_text, "history_entries.after_snapshot")?,
        recorded_at: row.get("recorded_at")?,
    })
}

fn serialize_snapshot(snapshot: &Snapshot) -> HistoryResult<String> {
    serde_json::to_string(snapshot)
        .map_err(|err| HistoryError::InvalidData(format!("snapshot failed to serialize: {err}")))
}

fn parse_snapshot(text: &str, column: &'static str) -> HistoryResult<Snapshot> {
    serde_json::from_str(text)
        .map_err(|err| HistoryError::InvalidData(format!("invalid snapshot in {column}: {err}")))
}

fn operation_to_db(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "create",
        Operation::Edit => "edit",
        Operation::Delete => "delete",
        Operation::Reorder => "reorder",
        Operation::Restore => "restore",
    }
}

fn parse_operation(value: &str) -> Option<Operation> {
    match value {
        "create" => Some(Operation::Create),
        "edit" => Some(Operation::Edit),
        "delete" => Some(Operation::Delete),
        "reorder" => Some(Operation::Reorder),
        "restore" => Some(Operation::Restore),
        _ => None,
    }
}

fn ensure_history_connection_ready(conn: &Connection) -> HistoryResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(HistoryError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "history_entries")? {
        return Err(HistoryError::MissingRequiredTable("history_entries"));
    }

    for column in [
        "sequence_number",
        "operation",
        "before_snapshot",
        "after_snapshot",
        "recorded_at",
    ] {
        if !table_has_column(conn, "history_entries", column)? {
            return Err(HistoryError::MissingRequiredColumn {
                table: "history_entries",
                column,
            });
        }
    }

    Ok(())
}
