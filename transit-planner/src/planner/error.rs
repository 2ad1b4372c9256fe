//! Planner error types.

use crate::domain::Time;
use crate::store::StoreError;

/// Errors that can occur while planning.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Rejected before any scanning
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The store has no connection at/after (or at/before) the start time
    #[error("no connections in range from {start}")]
    NoDataInRange { start: Time },

    /// A connection filter was asked about a window it was not built for
    #[error("window [{earliest}, {latest}] is outside the filter's window [{filter_earliest}, {filter_latest}]")]
    FilterWindow {
        earliest: Time,
        latest: Time,
        filter_earliest: Time,
        filter_latest: Time,
    },

    /// Configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Stop or store lookup failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
