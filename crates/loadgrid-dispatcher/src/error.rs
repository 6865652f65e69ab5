//! Dispatcher error types.

use loadgrid_core::TaskError;
use thiserror::Error;

/// Errors surfaced to callers of `Dispatcher::new` and `Dispatcher::submit`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("cluster unavailable: no hosts to place task {0} on")]
    ClusterUnavailable(u64),

    #[error("invalid task: {0}")]
    InvalidTask(#[from] TaskError),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
