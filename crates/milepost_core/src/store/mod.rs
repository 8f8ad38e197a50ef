//! Store layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the milestone store and history log contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Every committed store mutation appends exactly one history entry in
//!   the same transaction; the history log itself never mutates the store.
//! - Read paths reject invalid persisted state instead of masking it.

use rusqlite::Connection;

pub mod history_log;
pub mod milestone_store;

/// Reads the migrated schema version of a connection.
pub(crate) fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn table_has_column(
    conn: &Connection,
    table: &str,
    column: &str,
) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
