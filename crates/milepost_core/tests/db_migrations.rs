use milepost_core::db::migrations::{apply_migrations, latest_version};
use milepost_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
}

#[test]
fn migration_1_creates_milestones_table() {
    let conn = open_db_in_memory().unwrap();

    let mut stmt = conn.prepare("PRAGMA table_info(milestones);").unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut columns = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        let column_name: String = row.get(1).unwrap();
        columns.push(column_name);
    }
    for expected in ["title", "attributes", "position", "created_at", "updated_at"] {
        assert!(columns.contains(&expected.to_string()), "missing {expected}");
    }
}

#[test]
fn migration_2_creates_history_entries_table() {
    let conn = open_db_in_memory().unwrap();

    let mut stmt = conn.prepare("PRAGMA table_info(history_entries);").unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut columns = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        let column_name: String = row.get(1).unwrap();
        columns.push(column_name);
    }
    for expected in [
        "sequence_number",
        "operation",
        "before_snapshot",
        "after_snapshot",
        "recorded_at",
    ] {
        assert!(columns.contains(&expected.to_string()), "missing {expected}");
    }
}

#[test]
fn reopening_file_db_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("milepost.sqlite3");

    {
        let conn = open_db(&db_path).unwrap();
        conn.execute(
            "INSERT INTO milestones (title, attributes, position, created_at, updated_at)
             VALUES ('Kickoff', '{}', 0, 1, 1);",
            [],
        )
        .unwrap();
    }

    let conn = open_db(&db_path).unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM milestones;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn newer_schema_version_is_rejected() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA user_version = 99;").unwrap();

    let err = apply_migrations(&mut conn).unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedSchemaVersion { db_version: 99, .. }
    ));
}
