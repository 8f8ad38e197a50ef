//! History log domain model.
//!
//! # Responsibility
//! - Define the immutable entry recorded for every committed store mutation.
//! - Define snapshot shapes sufficient to replay state in either direction.
//!
//! # Invariants
//! - `sequence_number` values are strictly increasing and gapless.
//! - Entries are never modified or deleted after append.
//! - `recorded_at` is monotonic non-decreasing across entries.

use crate::model::milestone::Milestone;
use serde::{Deserialize, Serialize};

/// Kind of committed store mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A milestone was added at the end of the collection.
    Create,
    /// Attributes or title of one milestone were replaced in place.
    Edit,
    /// A milestone was removed and the position gap closed.
    Delete,
    /// A milestone was moved, shifting intervening positions.
    Reorder,
    /// The whole collection was replaced to commit a revert.
    Restore,
}

/// One `title -> position` assignment inside an ordering snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingSlot {
    pub title: String,
    pub position: i64,
}

/// Serialized state captured on one side of a mutation.
///
/// Snapshot pairs are chosen so that each entry can be applied forward
/// (after-state) or inverted (before-state) without consulting any other
/// entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    /// No state on this side (before a create, after a delete).
    Empty,
    /// Full state of the one affected milestone.
    Milestone { milestone: Milestone },
    /// Full position assignment of the collection.
    Ordering { slots: Vec<OrderingSlot> },
    /// Full collection state.
    Collection { milestones: Vec<Milestone> },
}

/// Immutable record of one committed store mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Strictly increasing, gapless; assigned at append time, never reused.
    pub sequence_number: i64,
    pub operation: Operation,
    pub before: Snapshot,
    pub after: Snapshot,
    /// Epoch ms append timestamp, non-decreasing across entries.
    pub recorded_at: i64,
}
