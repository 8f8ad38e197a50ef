//! Core domain logic for Milepost.
//! This crate is the single source of truth for milestone business
//! invariants and their change history.

pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::history::{HistoryEntry, Operation, OrderingSlot, Snapshot};
pub use model::milestone::{check_collection, Attributes, Milestone};
pub use service::milestone_service::{MilestoneService, ServiceError};
pub use store::history_log::{HistoryError, HistoryLog, HistoryResult, SqliteHistoryLog};
pub use store::milestone_store::{MilestoneStore, SqliteMilestoneStore, StoreError, StoreResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
