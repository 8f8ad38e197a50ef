use milepost_core::db::open_db_in_memory;
use milepost_core::{
    Attributes, HistoryError, HistoryLog, Milestone, MilestoneService, MilestoneStore, Operation,
    SqliteHistoryLog, SqliteMilestoneStore,
};
use serde_json::json;

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

fn attrs(pairs: &[(&str, serde_json::Value)]) -> Attributes {
    let mut attributes = Attributes::new();
    for (name, value) in pairs {
        attributes.insert((*name).to_string(), value.clone());
    }
    attributes
}

fn titles(milestones: &[Milestone]) -> Vec<&str> {
    milestones
        .iter()
        .map(|milestone| milestone.title.as_str())
        .collect()
}

#[test]
fn revert_to_unknown_sequence_fails() {
    let conn = setup();
    let store = SqliteMilestoneStore::try_new(&conn).unwrap();
    let log = SqliteHistoryLog::try_new(&conn).unwrap();

    store.create("A", Attributes::new()).unwrap();

    let err = log.revert_to(99).unwrap_err();
    assert!(matches!(err, HistoryError::InvalidSequenceNumber(99)));
    let err = log.revert_to(0).unwrap_err();
    assert!(matches!(err, HistoryError::InvalidSequenceNumber(0)));
}

#[test]
fn scenario_revert_to_edit_restores_edited_state() {
    let conn = setup();
    let store = SqliteMilestoneStore::try_new(&conn).unwrap();
    let log = SqliteHistoryLog::try_new(&conn).unwrap();

    store.create("A", Attributes::new()).unwrap();
    let edited = store.edit("A", attrs(&[("x", json!(1))])).unwrap();
    store.delete("A").unwrap();
    assert!(store.list().unwrap().is_empty());

    // Sequence 2 is the edit entry.
    let reverted = log.revert_to(2).unwrap();
    assert_eq!(reverted.len(), 1);
    assert_eq!(reverted[0], edited);
    assert_eq!(reverted[0].position, 0);
    assert_eq!(reverted[0].attributes.get("x"), Some(&json!(1)));
}

#[test]
fn revert_is_a_pure_read() {
    let conn = setup();
    let store = SqliteMilestoneStore::try_new(&conn).unwrap();
    let log = SqliteHistoryLog::try_new(&conn).unwrap();

    store.create("A", Attributes::new()).unwrap();
    store.create("B", Attributes::new()).unwrap();
    store.delete("A").unwrap();

    let live_before = store.list().unwrap();
    let entries_before = log.list_entries(None).unwrap();

    log.revert_to(1).unwrap();

    assert_eq!(store.list().unwrap(), live_before);
    assert_eq!(log.list_entries(None).unwrap(), entries_before);
}

#[test]
fn revert_reproduces_every_recorded_state() {
    let conn = setup();
    let store = SqliteMilestoneStore::try_new(&conn).unwrap();
    let log = SqliteHistoryLog::try_new(&conn).unwrap();

    // Mixed workload covering every operation kind; the state right after
    // the entry with sequence n is recorded[n - 1].
    let mut recorded: Vec<Vec<Milestone>> = Vec::new();
    store.create("A", Attributes::new()).unwrap();
    recorded.push(store.list().unwrap());
    store.create("B", attrs(&[("owner", json!("ada"))])).unwrap();
    recorded.push(store.list().unwrap());
    store.create("C", Attributes::new()).unwrap();
    recorded.push(store.list().unwrap());
    store.reorder("C", 0).unwrap();
    recorded.push(store.list().unwrap());
    store.edit("B", attrs(&[("owner", json!("lin"))])).unwrap();
    recorded.push(store.list().unwrap());
    store.rename("A", "A2").unwrap();
    recorded.push(store.list().unwrap());
    store.delete("B").unwrap();
    recorded.push(store.list().unwrap());
    store.reorder("A2", 0).unwrap();
    recorded.push(store.list().unwrap());

    for (index, expected) in recorded.iter().enumerate() {
        let sequence_number = index as i64 + 1;
        let reverted = log.revert_to(sequence_number).unwrap();
        assert_eq!(
            &reverted, expected,
            "revert to sequence {sequence_number} diverged"
        );
    }
}

#[test]
fn revert_to_latest_entry_returns_live_state() {
    let conn = setup();
    let store = SqliteMilestoneStore::try_new(&conn).unwrap();
    let log = SqliteHistoryLog::try_new(&conn).unwrap();

    store.create("A", Attributes::new()).unwrap();
    store.create("B", Attributes::new()).unwrap();

    let reverted = log.revert_to(2).unwrap();
    assert_eq!(reverted, store.list().unwrap());
}

#[test]
fn service_revert_commits_a_restore_entry() {
    let conn = setup();
    let service = MilestoneService::new(
        SqliteMilestoneStore::try_new(&conn).unwrap(),
        SqliteHistoryLog::try_new(&conn).unwrap(),
    );

    service.create("A", Attributes::new()).unwrap();
    service.create("B", Attributes::new()).unwrap();
    service.delete("A").unwrap();

    let applied = service.revert_to(2).unwrap();
    assert_eq!(titles(&applied), vec!["A", "B"]);
    assert_eq!(service.list().unwrap(), applied);

    let entries = service.history(None).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3].operation, Operation::Restore);
}

#[test]
fn reverts_compose_across_restore_entries() {
    let conn = setup();
    let service = MilestoneService::new(
        SqliteMilestoneStore::try_new(&conn).unwrap(),
        SqliteHistoryLog::try_new(&conn).unwrap(),
    );

    service.create("A", Attributes::new()).unwrap();
    service.create("B", Attributes::new()).unwrap();
    service.delete("A").unwrap(); // seq 3
    service.revert_to(2).unwrap(); // seq 4: restore [A, B]
    service.create("C", Attributes::new()).unwrap(); // seq 5

    // Reverting past the restore entry lands on the post-delete state.
    let preview = service.revert_preview(3).unwrap();
    assert_eq!(titles(&preview), vec!["B"]);

    // Live state is untouched by the preview.
    assert_eq!(titles(&service.list().unwrap()), vec!["A", "B", "C"]);
}

#[test]
fn revert_preview_does_not_grow_history() {
    let conn = setup();
    let service = MilestoneService::new(
        SqliteMilestoneStore::try_new(&conn).unwrap(),
        SqliteHistoryLog::try_new(&conn).unwrap(),
    );

    service.create("A", Attributes::new()).unwrap();
    service.create("B", Attributes::new()).unwrap();

    service.revert_preview(1).unwrap();
    assert_eq!(service.history(None).unwrap().len(), 2);

    service.revert_to(1).unwrap();
    assert_eq!(service.history(None).unwrap().len(), 3);
}
