//! Correlation Support Types
//!
//! The id generator and the per-request bookkeeping entry used by the
//! [`CorrelationManager`](super::CorrelationManager).

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicI64, Ordering};

// Layer 2: Third-party crate imports
use serde_json::Value;
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use super::error::CorrelationResult;
use crate::protocol::{JsonRpcError, RequestId};

/// Outcome delivered to an outbound-request waiter: the peer's result value
/// or its error object.
pub type SettledResponse = Result<Value, JsonRpcError>;

/// Thread-safe monotonic request id generator
///
/// Ids issued by one generator are pairwise distinct for the lifetime of the
/// session; both peers run their own counter, so collisions across
/// directions are irrelevant (correlation is per-direction).
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    next: AtomicI64,
}

impl RequestIdGenerator {
    /// Generator starting at id 1
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    /// Allocate the next id
    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Single-shot settlement handle for one pending outbound request
#[derive(Debug)]
pub struct PendingRequest {
    sender: oneshot::Sender<CorrelationResult<SettledResponse>>,
}

impl PendingRequest {
    pub(crate) fn new(sender: oneshot::Sender<CorrelationResult<SettledResponse>>) -> Self {
        Self { sender }
    }

    /// Settle the waiter exactly once. Returns `false` when the waiter
    /// already went away.
    pub(crate) fn settle(self, outcome: CorrelationResult<SettledResponse>) -> bool {
        self.sender.send(outcome).is_ok()
    }
}
