//! Milestone use-case service.
//!
//! # Responsibility
//! - Normalize and validate caller input above the store layer.
//! - Orchestrate the revert flow: preview from the log, commit via the
//!   store.
//!
//! # Invariants
//! - Titles are trimmed; blank titles never reach the store.
//! - A revert is committed only through `MilestoneStore::restore`, so every
//!   commit is recorded as one `Restore` entry.

use crate::model::history::HistoryEntry;
use crate::model::milestone::{Attributes, Milestone};
use crate::store::history_log::{HistoryError, HistoryLog};
use crate::store::milestone_store::{MilestoneStore, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from milestone service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Title is blank after trimming.
    InvalidTitle,
    /// Store-level failure (duplicate title, not found, invalid position,
    /// persistence).
    Store(StoreError),
    /// History-level failure (invalid sequence number, persistence).
    History(HistoryError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "milestone title must not be blank"),
            Self::Store(err) => write!(f, "{err}"),
            Self::History(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTitle => None,
            Self::Store(err) => Some(err),
            Self::History(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<HistoryError> for ServiceError {
    fn from(value: HistoryError) -> Self {
        Self::History(value)
    }
}

/// Use-case facade over the milestone store and history log.
pub struct MilestoneService<S: MilestoneStore, H: HistoryLog> {
    store: S,
    history: H,
}

impl<S: MilestoneStore, H: HistoryLog> MilestoneService<S, H> {
    /// Creates a service from store and history implementations sharing one
    /// underlying database.
    pub fn new(store: S, history: H) -> Self {
        Self { store, history }
    }

    /// Creates a milestone at the end of the collection.
    pub fn create(&self, title: &str, attributes: Attributes) -> Result<Milestone, ServiceError> {
        let title = normalize_title(title)?;
        Ok(self.store.create(&title, attributes)?)
    }

    /// Replaces the attributes of an existing milestone.
    pub fn edit(&self, title: &str, attributes: Attributes) -> Result<Milestone, ServiceError> {
        let title = normalize_title(title)?;
        Ok(self.store.edit(&title, attributes)?)
    }

    /// Renames an existing milestone, preserving position and attributes.
    pub fn rename(&self, old_title: &str, new_title: &str) -> Result<Milestone, ServiceError> {
        let old_title = normalize_title(old_title)?;
        let new_title = normalize_title(new_title)?;
        Ok(self.store.rename(&old_title, &new_title)?)
    }

    /// Deletes a milestone and closes the position gap.
    pub fn delete(&self, title: &str) -> Result<Milestone, ServiceError> {
        let title = normalize_title(title)?;
        Ok(self.store.delete(&title)?)
    }

    /// Moves a milestone to a new rank and returns the resulting ordering.
    pub fn reorder(&self, title: &str, new_position: i64) -> Result<Vec<Milestone>, ServiceError> {
        let title = normalize_title(title)?;
        Ok(self.store.reorder(&title, new_position)?)
    }

    /// Loads one milestone by title.
    pub fn get(&self, title: &str) -> Result<Option<Milestone>, ServiceError> {
        let title = normalize_title(title)?;
        Ok(self.store.get(&title)?)
    }

    /// Lists the live collection by ascending position.
    pub fn list(&self) -> Result<Vec<Milestone>, ServiceError> {
        Ok(self.store.list()?)
    }

    /// Lists history entries, optionally after a sequence number.
    pub fn history(&self, since: Option<i64>) -> Result<Vec<HistoryEntry>, ServiceError> {
        Ok(self.history.list_entries(since)?)
    }

    /// Reconstructs a past collection state without applying it.
    pub fn revert_preview(&self, sequence_number: i64) -> Result<Vec<Milestone>, ServiceError> {
        Ok(self.history.revert_to(sequence_number)?)
    }

    /// Reconstructs a past collection state and commits it, recording the
    /// commit as a `Restore` history entry.
    pub fn revert_to(&self, sequence_number: i64) -> Result<Vec<Milestone>, ServiceError> {
        let reverted = self.history.revert_to(sequence_number)?;
        Ok(self.store.restore(&reverted)?)
    }
}

fn normalize_title(title: &str) -> Result<String, ServiceError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
