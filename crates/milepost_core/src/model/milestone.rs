//! Milestone domain model.
//!
//! # Responsibility
//! - Define the canonical milestone record shared by store and history.
//! - Provide the collection-level invariant check used by restore/replay.
//!
//! # Invariants
//! - `title` is the identity key; live titles are pairwise distinct
//!   (case-sensitive exact match).
//! - `position` values of a live collection are exactly `0..count-1`.
//! - Attribute ordering is preserved as entered.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Ordered attribute name -> value mapping attached to one milestone.
///
/// Values are free-form JSON; serde_json's `preserve_order` feature keeps
/// insertion order stable through snapshot round-trips.
pub type Attributes = serde_json::Map<String, Value>;

/// Canonical milestone record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Identity key, unique across the live collection.
    pub title: String,
    /// Free-form attributes, order preserved.
    pub attributes: Attributes,
    /// Contiguous rank within the collection, starting at 0.
    pub position: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms of the last edit/rename of this milestone. Position shifts
    /// caused by other milestones never touch it.
    pub updated_at: i64,
}

impl Milestone {
    /// Creates a milestone at the given position with fresh timestamps.
    pub fn new(title: impl Into<String>, attributes: Attributes, position: i64) -> Self {
        let now = now_epoch_ms();
        Self {
            title: title.into(),
            attributes,
            position,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returns the current wall clock as epoch milliseconds.
///
/// Clamps to zero for clocks before the epoch instead of panicking.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Checks collection-level invariants: pairwise distinct titles and
/// positions forming exactly `0..len-1`.
///
/// The slice does not need to be sorted; positions are checked as a set.
pub fn check_collection(milestones: &[Milestone]) -> Result<(), String> {
    let count = milestones.len() as i64;
    let mut titles = HashSet::with_capacity(milestones.len());
    let mut positions = HashSet::with_capacity(milestones.len());
    for milestone in milestones {
        if !titles.insert(milestone.title.as_str()) {
            return Err(format!("duplicate title `{}`", milestone.title));
        }
        if milestone.position < 0 || milestone.position >= count {
            return Err(format!(
                "position {} outside 0..{count} at `{}`",
                milestone.position, milestone.title
            ));
        }
        if !positions.insert(milestone.position) {
            return Err(format!(
                "duplicate position {} at `{}`",
                milestone.position, milestone.title
            ));
        }
    }
    Ok(())
}
