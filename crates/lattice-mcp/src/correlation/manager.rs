//! Correlation Manager
//!
//! Bidirectional JSON-RPC request/response correlation: every outbound
//! request registers a single-shot settlement handle keyed by its id; the
//! inbound loop settles the handle when the matching response arrives.
//! Responses with no pending waiter are dropped silently, and no waiter is
//! ever settled twice (removal and settlement are one atomic step).

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace};

// Layer 3: Internal module imports
use super::error::{CorrelationError, CorrelationResult};
use super::types::{PendingRequest, RequestIdGenerator, SettledResponse};
use crate::protocol::RequestId;

/// Configuration for the correlation manager
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Maximum number of pending requests (0 = unlimited)
    pub max_pending_requests: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_pending_requests: 1000,
        }
    }
}

/// Pending-outbound request table
///
/// # Examples
///
/// ```rust
/// use lattice_mcp::correlation::CorrelationManager;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = CorrelationManager::default();
///
/// let (id, receiver) = manager.register()?;
/// manager.settle(&id, Ok(json!({"ok": true})));
/// let outcome = receiver.await??;
/// assert!(outcome.is_ok());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CorrelationManager {
    requests: Arc<DashMap<RequestId, PendingRequest>>,
    id_generator: RequestIdGenerator,
    config: CorrelationConfig,
}

impl CorrelationManager {
    /// Manager with the given configuration
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            id_generator: RequestIdGenerator::new(),
            config,
        }
    }

    /// Allocate an id and install its settlement handle
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::Internal`] when the pending table is at
    /// capacity.
    pub fn register(
        &self,
    ) -> CorrelationResult<(
        RequestId,
        oneshot::Receiver<CorrelationResult<SettledResponse>>,
    )> {
        if self.config.max_pending_requests > 0
            && self.requests.len() >= self.config.max_pending_requests
        {
            return Err(CorrelationError::Internal {
                message: "maximum pending requests exceeded".to_string(),
            });
        }

        let (sender, receiver) = oneshot::channel();
        let id = self.id_generator.next_id();
        trace!(%id, "registered outbound request");
        self.requests.insert(id.clone(), PendingRequest::new(sender));
        Ok((id, receiver))
    }

    /// Settle the pending request with the peer's response
    ///
    /// Returns `true` when a waiter was settled; `false` when the id is
    /// unknown (the response is dropped) or the waiter hung up.
    pub fn settle(&self, id: &RequestId, response: SettledResponse) -> bool {
        match self.requests.remove(id) {
            Some((_, pending)) => {
                debug!(%id, "settling outbound request");
                pending.settle(Ok(response))
            }
            None => {
                debug!(%id, "dropping response with no pending waiter");
                false
            }
        }
    }

    /// Break the pending request with a timeout error
    pub fn expire(&self, id: &RequestId, elapsed_ms: u128) {
        if let Some((_, pending)) = self.requests.remove(id) {
            debug!(%id, elapsed_ms, "expiring outbound request");
            let _ = pending.settle(Err(CorrelationError::Timeout {
                id: id.clone(),
                elapsed_ms,
            }));
        }
    }

    /// Drop the pending entry without settling (caller already gave up)
    pub fn forget(&self, id: &RequestId) {
        self.requests.remove(id);
    }

    /// Number of requests currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    /// Break every pending request on shutdown
    pub fn drain(&self) {
        let ids: Vec<RequestId> = self.requests.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, pending)) = self.requests.remove(&id) {
                let _ = pending.settle(Err(CorrelationError::ChannelClosed { id }));
            }
        }
    }
}
