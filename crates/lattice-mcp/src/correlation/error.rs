//! Correlation Error Types

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::protocol::RequestId;

/// Result type for correlation operations
pub type CorrelationResult<T> = Result<T, CorrelationError>;

/// Errors from the pending-request correlation layer
#[derive(Error, Debug)]
pub enum CorrelationError {
    /// No pending request with this ID
    #[error("no pending request with id {id}")]
    RequestNotFound { id: RequestId },

    /// The waiter side hung up before the response arrived
    #[error("settlement channel closed for request {id}")]
    ChannelClosed { id: RequestId },

    /// The request was not answered within its deadline
    #[error("request {id} timed out after {elapsed_ms}ms")]
    Timeout { id: RequestId, elapsed_ms: u128 },

    /// Capacity or bookkeeping failure
    #[error("correlation internal error: {message}")]
    Internal { message: String },
}
