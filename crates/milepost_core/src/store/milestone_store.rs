//! Milestone store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Maintain the authoritative ordered milestone collection.
//! - Commit every mutation atomically together with its history entry.
//!
//! # Invariants
//! - Live titles are pairwise distinct (case-sensitive exact match).
//! - Positions form the contiguous range `0..count-1` after every commit.
//! - A failed operation leaves no observable state change and no history
//!   entry.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::history::{Operation, OrderingSlot, Snapshot};
use crate::model::milestone::{check_collection, now_epoch_ms, Attributes, Milestone};
use crate::store::history_log::{append_entry, HistoryError};
use crate::store::{schema_version, table_exists, table_has_column};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MILESTONE_SELECT_SQL: &str = "SELECT
    title,
    attributes,
    position,
    created_at,
    updated_at
FROM milestones";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from milestone store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Create/rename target title already exists in the live collection.
    DuplicateTitle(String),
    /// No live milestone carries the given title.
    NotFound(String),
    /// Reorder target rank is outside `[0, count-1]`.
    InvalidPosition { requested: i64, count: usize },
    /// Restore input violates title or position invariants.
    InvalidRestoreState(String),
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
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateTitle(title) => write!(f, "milestone title already in use: `{title}`"),
            Self::NotFound(title) => write!(f, "milestone not found: `{title}`"),
            Self::InvalidPosition { requested, count } => write!(
                f,
                "position {requested} is outside the valid range 0..{count}"
            ),
            Self::InvalidRestoreState(message) => {
                write!(f, "restore state rejected: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "milestone store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "milestone store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "milestone store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted milestone data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<HistoryError> for StoreError {
    fn from(value: HistoryError) -> Self {
        match value {
            HistoryError::Db(err) => Self::Db(err),
            other => Self::InvalidData(other.to_string()),
        }
    }
}

/// Store interface for milestone collection operations.
///
/// Mutating operations are atomic: the state change and its history entry
/// commit together or not at all.
pub trait MilestoneStore {
    /// Creates a milestone at the end of the collection.
    fn create(&self, title: &str, attributes: Attributes) -> StoreResult<Milestone>;
    /// Replaces the attributes of an existing milestone in place.
    fn edit(&self, title: &str, attributes: Attributes) -> StoreResult<Milestone>;
    /// Changes the identity key of an existing milestone, keeping its
    /// position and attributes.
    fn rename(&self, old_title: &str, new_title: &str) -> StoreResult<Milestone>;
    /// Removes a milestone and closes the position gap it leaves.
    fn delete(&self, title: &str) -> StoreResult<Milestone>;
    /// Moves a milestone to a new rank with list-move semantics and returns
    /// the resulting ordering.
    fn reorder(&self, title: &str, new_position: i64) -> StoreResult<Vec<Milestone>>;
    /// Loads one live milestone by title. Read-only.
    fn get(&self, title: &str) -> StoreResult<Option<Milestone>>;
    /// Lists the live collection by ascending position. Read-only.
    fn list(&self) -> StoreResult<Vec<Milestone>>;
    /// Replaces the whole collection state. Used by the caller-side commit
    /// of a revert; the replacement is recorded as a `Restore` entry.
    fn restore(&self, milestones: &[Milestone]) -> StoreResult<Vec<Milestone>>;
}

/// SQLite-backed milestone store.
#[derive(Debug)]
pub struct SqliteMilestoneStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMilestoneStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl MilestoneStore for SqliteMilestoneStore<'_> {
    fn create(&self, title: &str, attributes: Attributes) -> StoreResult<Milestone> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_milestone(&tx, title)?.is_some() {
            return Err(StoreError::DuplicateTitle(title.to_string()));
        }

        let position = live_count(&tx)? as i64;
        let milestone = Milestone::new(title, attributes, position);
        insert_milestone(&tx, &milestone)?;
        append_entry(
            &tx,
            Operation::Create,
            &Snapshot::Empty,
            &Snapshot::Milestone {
                milestone: milestone.clone(),
            },
        )?;
        tx.commit()?;
        Ok(milestone)
    }

    fn edit(&self, title: &str, attributes: Attributes) -> StoreResult<Milestone> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let before =
            load_milestone(&tx, title)?.ok_or_else(|| StoreError::NotFound(title.to_string()))?;

        let mut after = before.clone();
        after.attributes = attributes;
        after.updated_at = now_epoch_ms();
        tx.execute(
            "UPDATE milestones
             SET attributes = ?2,
                 updated_at = ?3
             WHERE title = ?1;",
            params![
                after.title.as_str(),
                serialize_attributes(&after.attributes)?,
                after.updated_at,
            ],
        )?;
        append_entry(
            &tx,
            Operation::Edit,
            &Snapshot::Milestone { milestone: before },
            &Snapshot::Milestone {
                milestone: after.clone(),
            },
        )?;
        tx.commit()?;
        Ok(after)
    }

    fn rename(&self, old_title: &str, new_title: &str) -> StoreResult<Milestone> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let before = load_milestone(&tx, old_title)?
            .ok_or_else(|| StoreError::NotFound(old_title.to_string()))?;
        if new_title != old_title && load_milestone(&tx, new_title)?.is_some() {
            return Err(StoreError::DuplicateTitle(new_title.to_string()));
        }

        let mut after = before.clone();
        after.title = new_title.to_string();
        after.updated_at = now_epoch_ms();
        tx.execute(
            "UPDATE milestones
             SET title = ?2,
                 updated_at = ?3
             WHERE title = ?1;",
            params![old_title, after.title.as_str(), after.updated_at],
        )?;
        append_entry(
            &tx,
            Operation::Edit,
            &Snapshot::Milestone { milestone: before },
            &Snapshot::Milestone {
                milestone: after.clone(),
            },
        )?;
        tx.commit()?;
        Ok(after)
    }

    fn delete(&self, title: &str) -> StoreResult<Milestone> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let before =
            load_milestone(&tx, title)?.ok_or_else(|| StoreError::NotFound(title.to_string()))?;

        tx.execute("DELETE FROM milestones WHERE title = ?1;", [title])?;
        // Close the gap; `updated_at` of shifted rows stays untouched so
        // ordering-only snapshots can reproduce state exactly.
        tx.execute(
            "UPDATE milestones SET position = position - 1 WHERE position > ?1;",
            [before.position],
        )?;
        append_entry(
            &tx,
            Operation::Delete,
            &Snapshot::Milestone {
                milestone: before.clone(),
            },
            &Snapshot::Empty,
        )?;
        tx.commit()?;
        Ok(before)
    }

    fn reorder(&self, title: &str, new_position: i64) -> StoreResult<Vec<Milestone>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut ordered = load_collection(&tx)?;
        let count = ordered.len();
        let from = ordered
            .iter()
            .position(|milestone| milestone.title == title)
            .ok_or_else(|| StoreError::NotFound(title.to_string()))?;
        if new_position < 0 || new_position as usize >= count {
            return Err(StoreError::InvalidPosition {
                requested: new_position,
                count,
            });
        }

        let before_slots = ordering_slots(&ordered);
        let moved = ordered.remove(from);
        ordered.insert(new_position as usize, moved);
        for (index, milestone) in ordered.iter_mut().enumerate() {
            milestone.position = index as i64;
        }
        for milestone in &ordered {
            tx.execute(
                "UPDATE milestones SET position = ?2 WHERE title = ?1;",
                params![milestone.title.as_str(), milestone.position],
            )?;
        }
        append_entry(
            &tx,
            Operation::Reorder,
            &Snapshot::Ordering {
                slots: before_slots,
            },
            &Snapshot::Ordering {
                slots: ordering_slots(&ordered),
            },
        )?;
        tx.commit()?;
        Ok(ordered)
    }

    fn get(&self, title: &str) -> StoreResult<Option<Milestone>> {
        load_milestone(self.conn, title)
    }

    fn list(&self) -> StoreResult<Vec<Milestone>> {
        load_collection(self.conn)
    }

    fn restore(&self, milestones: &[Milestone]) -> StoreResult<Vec<Milestone>> {
        check_collection(milestones).map_err(StoreError::InvalidRestoreState)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let before = load_collection(&tx)?;

        let mut restored = milestones.to_vec();
        restored.sort_by_key(|milestone| milestone.position);
        tx.execute("DELETE FROM milestones;", [])?;
        for milestone in &restored {
            insert_milestone(&tx, milestone)?;
        }
        append_entry(
            &tx,
            Operation::Restore,
            &Snapshot::Collection { milestones: before },
            &Snapshot::Collection {
                milestones: restored.clone(),
            },
        )?;
        tx.commit()?;
        Ok(restored)
    }
}

pub(crate) fn load_milestone(conn: &Connection, title: &str) -> StoreResult<Option<Milestone>> {
    let mut stmt = conn.prepare(&format!("{MILESTONE_SELECT_SQL} WHERE title = ?1;"))?;
    let mut rows = stmt.query([title])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_milestone_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_collection(conn: &Connection) -> StoreResult<Vec<Milestone>> {
    let mut stmt = conn.prepare(&format!(
        "{MILESTONE_SELECT_SQL} ORDER BY position ASC, title ASC;"
    ))?;
    let mut rows = stmt.query([])?;
    let mut milestones = Vec::new();
    while let Some(row) = rows.next()? {
        milestones.push(parse_milestone_row(row)?);
    }
    Ok(milestones)
}

fn live_count(conn: &Connection) -> StoreResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM milestones;", [], |row| row.get(0))?;
    Ok(count as usize)
}

fn insert_milestone(conn: &Connection, milestone: &Milestone) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO milestones (
            title,
            attributes,
            position,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            milestone.title.as_str(),
            serialize_attributes(&milestone.attributes)?,
            milestone.position,
            milestone.created_at,
            milestone.updated_at,
        ],
    )?;
    Ok(())
}

fn parse_milestone_row(row: &Row<'_>) -> StoreResult<Milestone> {
    let attributes_text: String = row.get("attributes")?;
    let attributes = parse_attributes(&attributes_text)?;
    Ok(Milestone {
        title: row.get("title")?,
        attributes,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn serialize_attributes(attributes: &Attributes) -> StoreResult<String> {
    serde_json::to_string(attributes).map_err(|err| {
        StoreError::InvalidData(format!("attributes failed to serialize: {err}"))
    })
}

fn parse_attributes(text: &str) -> StoreResult<Attributes> {
    serde_json::from_str(text).map_err(|err| {
        StoreError::InvalidData(format!(
            "invalid attributes JSON in milestones.attributes: {err}"
        ))
    })
}

fn ordering_slots(milestones: &[Milestone]) -> Vec<OrderingSlot> {
    milestones
        .iter()
        .map(|milestone| OrderingSlot {
            title: milestone.title.clone(),
            position: milestone.position,
        })
        .collect()
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "milestones")? {
        return Err(StoreError::MissingRequiredTable("milestones"));
    }

    for column in ["title", "attributes", "position", "created_at", "updated_at"] {
        if !table_has_column(conn, "milestones", column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: "milestones",
                column,
            });
        }
    }

    Ok(())
}
