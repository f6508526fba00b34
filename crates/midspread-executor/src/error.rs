//! Executor error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{op} timed out after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Exchange API error: {0}")]
    Api(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Cancel failed: {0}")]
    CancelFailed(String),

    #[error("Server time unavailable: {0}")]
    ServerTimeUnavailable(String),

    #[error("Connection pool is empty")]
    EmptyPool,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExecResult<T> = Result<T, ExecError>;
