use milepost_core::{check_collection, Attributes, Milestone};
use serde_json::json;

#[test]
fn check_collection_accepts_contiguous_unique_collection() {
    let milestones = vec![
        Milestone::new("A", Attributes::new(), 0),
        Milestone::new("B", Attributes::new(), 1),
        Milestone::new("C", Attributes::new(), 2),
    ];
    assert!(check_collection(&milestones).is_ok());
}

#[test]
fn check_collection_accepts_unsorted_input() {
    let milestones = vec![
        Milestone::new("B", Attributes::new(), 1),
        Milestone::new("A", Attributes::new(), 0),
    ];
    assert!(check_collection(&milestones).is_ok());
}

#[test]
fn check_collection_rejects_duplicate_titles() {
    let milestones = vec![
        Milestone::new("Twin", Attributes::new(), 0),
        Milestone::new("Twin", Attributes::new(), 1),
    ];
    let message = check_collection(&milestones).unwrap_err();
    assert!(message.contains("duplicate title"));
}

#[test]
fn check_collection_rejects_position_gaps_and_duplicates() {
    let gapped = vec![
        Milestone::new("A", Attributes::new(), 0),
        Milestone::new("B", Attributes::new(), 2),
    ];
    assert!(check_collection(&gapped).is_err());

    let duplicated = vec![
        Milestone::new("A", Attributes::new(), 0),
        Milestone::new("B", Attributes::new(), 0),
    ];
    let message = check_collection(&duplicated).unwrap_err();
    assert!(message.contains("duplicate position"));

    let negative = vec![Milestone::new("A", Attributes::new(), -1)];
    assert!(check_collection(&negative).is_err());
}

#[test]
fn check_collection_accepts_empty_collection() {
    assert!(check_collection(&[]).is_ok());
}

#[test]
fn attributes_preserve_insertion_order_through_serde() {
    let mut attributes = Attributes::new();
    attributes.insert("zeta".to_string(), json!("last in name, first in"));
    attributes.insert("alpha".to_string(), json!(1));
    attributes.insert("mid".to_string(), json!(null));

    let milestone = Milestone::new("Ordered", attributes, 0);
    let text = serde_json::to_string(&milestone).unwrap();
    let parsed: Milestone = serde_json::from_str(&text).unwrap();

    let names: Vec<&String> = parsed.attributes.keys().collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    assert_eq!(parsed, milestone);
}

#[test]
fn new_milestone_starts_with_equal_timestamps() {
    let milestone = Milestone::new("Fresh", Attributes::new(), 0);
    assert_eq!(milestone.created_at, milestone.updated_at);
    assert!(milestone.created_at > 0);
}
