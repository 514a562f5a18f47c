//! Lifecycle callbacks delivered by the batch worker.
//!
//! All four callbacks default to logging no-ops so the engine never has an
//! unset callback to guard against. They are stored as `Arc`ed closures:
//! the worker snapshots the current set outside the engine lock before
//! every emission, so replacing a callback mid-batch affects subsequent
//! emissions without blocking configuration calls.

use std::sync::Arc;
use tracing::info;

use super::error::TransferError;
use crate::net::Direction;

/// Called once when the batch worker starts.
pub type StartedCallback = Arc<dyn Fn(Direction) + Send + Sync>;

/// Called with the aggregated `(total, current)` byte counters of the
/// whole batch, zero or more times between `started` and the terminal
/// callback.
pub type ProgressCallback = Arc<dyn Fn(Direction, u64, u64) + Send + Sync>;

/// Called once when every request of the batch completed successfully.
pub type CompletedCallback = Arc<dyn Fn(Direction) + Send + Sync>;

/// Called once when the batch terminated with an error.
pub type FailedCallback = Arc<dyn Fn(Direction, TransferError) + Send + Sync>;

/// The registered callback set.
#[derive(Clone)]
pub(crate) struct Callbacks {
    pub started: StartedCallback,
    pub progress: ProgressCallback,
    pub completed: CompletedCallback,
    pub failed: FailedCallback,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            started: Arc::new(|direction| {
                info!(?direction, "default started callback");
            }),
            progress: Arc::new(|direction, total, current| {
                info!(?direction, total, current, "default progress callback");
            }),
            completed: Arc::new(|direction| {
                info!(?direction, "default completed callback");
            }),
            failed: Arc::new(|direction, error| {
                info!(?direction, error = error.as_str(), "default failed callback");
            }),
        }
    }
}
