//! SSE Stream Registry
//!
//! Per-connection state for the server's GET streams: sequence numbering,
//! the bounded replay ring, reconnect resumption, and round-robin steering
//! of server-initiated messages.
//!
//! A stream handle outlives its HTTP connection: when the client drops, the
//! live sender is cleared but the ring is kept, so a reconnect with
//! `Last-Event-ID` can replay what was missed (within ring bounds).

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use axum::response::sse::Event;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};
use uuid::Uuid;

/// Receiving end of one SSE connection
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// One logical SSE stream (survives reconnects)
pub struct SseStream {
    id: String,
    seq: AtomicU64,
    ring: Mutex<VecDeque<(u64, String)>>,
    live: Mutex<Option<mpsc::UnboundedSender<Event>>>,
}

impl SseStream {
    fn new(id: String) -> Self {
        Self {
            id,
            seq: AtomicU64::new(0),
            ring: Mutex::new(VecDeque::new()),
            live: Mutex::new(None),
        }
    }

    /// Opaque stream token
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Emit a payload on this stream if a client is connected.
    ///
    /// Allocates the next sequence number, records the event in the replay
    /// ring, and pushes it to the live connection. Returns `false` without
    /// recording anything when no client is attached, so the caller can try
    /// another stream.
    async fn emit(&self, payload: &str, ring_capacity: usize) -> bool {
        let mut live = self.live.lock().await;
        let Some(sender) = live.as_ref() else {
            return false;
        };

        let seq = self.seq.fetch_add(1, Ordering::AcqRel) + 1;
        let event = Event::default()
            .id(format!("{}:{seq}", self.id))
            .data(payload);
        if sender.send(event).is_err() {
            // Client went away: roll the sequence back so the caller can
            // steer this payload to another stream without a later replay
            // duplicating it here. The live lock serializes emits, so the
            // rollback cannot race another allocation on this stream.
            self.seq.fetch_sub(1, Ordering::AcqRel);
            *live = None;
            return false;
        }

        let mut ring = self.ring.lock().await;
        ring.push_back((seq, payload.to_string()));
        while ring.len() > ring_capacity {
            ring.pop_front();
        }
        trace!(stream = %self.id, seq, "sse event emitted");
        true
    }
}

/// All SSE streams belonging to one session
pub struct StreamRegistry {
    streams: DashMap<String, Arc<SseStream>>,
    order: Mutex<Vec<String>>,
    rr_index: AtomicUsize,
    ring_capacity: usize,
}

impl StreamRegistry {
    /// Registry with the given per-stream replay capacity
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            streams: DashMap::new(),
            order: Mutex::new(Vec::new()),
            rr_index: AtomicUsize::new(0),
            ring_capacity,
        }
    }

    /// Open a fresh stream, priming it with an `event: ping` carrying id
    /// `<streamId>:0` so the client learns the stream token.
    pub async fn open(&self) -> (Arc<SseStream>, EventReceiver) {
        let id = Uuid::new_v4().simple().to_string();
        let stream = Arc::new(SseStream::new(id.clone()));
        let (tx, rx) = mpsc::unbounded_channel();

        let priming = Event::default()
            .id(format!("{id}:0"))
            .event("ping")
            .data("{}");
        let _ = tx.send(priming);
        *stream.live.lock().await = Some(tx);

        self.streams.insert(id.clone(), Arc::clone(&stream));
        self.order.lock().await.push(id.clone());
        debug!(stream = %id, "sse stream opened");
        (stream, rx)
    }

    /// Resume a stream after reconnect, replaying events with sequence
    /// greater than `after_seq`.
    ///
    /// Returns `None` when the stream is unknown or the requested events
    /// fell out of the replay ring; the caller answers 204 so the client
    /// reinitializes cleanly.
    pub async fn resume(&self, stream_id: &str, after_seq: u64) -> Option<EventReceiver> {
        let stream = self.streams.get(stream_id)?.clone();

        let ring = stream.ring.lock().await;
        let current = stream.seq.load(Ordering::Acquire);
        if current > after_seq {
            // Something must be replayed; the ring has to reach back far
            // enough, else the gap is irrecoverable.
            match ring.front() {
                Some((oldest, _)) if *oldest <= after_seq + 1 => {}
                _ => {
                    debug!(stream = %stream_id, after_seq, "replay window evicted");
                    return None;
                }
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for (seq, payload) in ring.iter().filter(|(seq, _)| *seq > after_seq) {
            let event = Event::default()
                .id(format!("{stream_id}:{seq}"))
                .data(payload.clone());
            let _ = tx.send(event);
        }
        drop(ring);

        *stream.live.lock().await = Some(tx);
        debug!(stream = %stream_id, after_seq, "sse stream resumed");
        Some(rx)
    }

    /// Steer one payload to a connected stream, round-robin.
    ///
    /// Returns `false` when no stream has a live client; the message is
    /// dropped by the caller (such a peer is not listening).
    pub async fn steer(&self, payload: &str) -> bool {
        let order = self.order.lock().await.clone();
        if order.is_empty() {
            return false;
        }

        let start = self.rr_index.fetch_add(1, Ordering::Relaxed);
        for i in 0..order.len() {
            let id = &order[(start + i) % order.len()];
            if let Some(stream) = self.streams.get(id) {
                let stream = stream.clone();
                if stream.emit(payload, self.ring_capacity).await {
                    return true;
                }
            }
        }
        false
    }

    /// Drop every stream (session termination)
    pub async fn clear(&self) {
        self.streams.clear();
        self.order.lock().await.clear();
    }

    /// Number of registered streams (connected or resumable)
    pub async fn len(&self) -> usize {
        self.order.lock().await.len()
    }

    /// Whether no streams are registered
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("ring_capacity", &self.ring_capacity)
            .finish_non_exhaustive()
    }
}
