//! Event types for the rosterlink reconciliation workspace
//!
//! Provides the shared [`ReconcileEvent`] definitions and the [`EventBus`].
//! The reconciliation core emits events as records move through their
//! lifecycle; consumers (an eventual UI/SSE layer, tests) subscribe without
//! the core knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Outcome of one existence check, as carried by events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result")]
pub enum CheckResult {
    /// A matching person exists in the directory
    Exists { directory_id: i64 },
    /// No matching person found
    NotFound,
    /// The check itself failed (transport/API error)
    Error { message: String },
}

/// Outcome of one processing action, as carried by events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result")]
pub enum ProcessResult {
    /// Create-or-update completed; `directory_id` is the canonical directory id
    Succeeded { directory_id: i64 },
    /// The action failed; the record keeps its error message for retry
    Failed { message: String },
}

/// Reconciliation event types
///
/// Events are broadcast via [`EventBus`] and serialize cleanly for an SSE
/// transport layered on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReconcileEvent {
    /// A new import session replaced the previous one
    SessionLoaded {
        session_id: Uuid,
        /// Valid records parsed from the file
        total_records: usize,
        timestamp: DateTime<Utc>,
    },

    /// A demand signal selected the next batch of existence checks
    ChecksRequested {
        session_id: Uuid,
        /// Records selected in this batch (0 at end of list)
        requested: usize,
        /// Rows whose existence check has been initiated so far
        processed_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// One record's existence check resolved
    RecordChecked {
        session_id: Uuid,
        record_id: Uuid,
        outcome: CheckResult,
        timestamp: DateTime<Utc>,
    },

    /// A processing action (create-or-update) started for one record
    ProcessingStarted {
        session_id: Uuid,
        record_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// One record's processing action reached a terminal outcome
    RecordProcessed {
        session_id: Uuid,
        record_id: Uuid,
        outcome: ProcessResult,
        /// Operator-facing outcome/error text
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A terminal existence check was explicitly re-queued by the operator
    RecordRequeued {
        session_id: Uuid,
        record_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`, providing non-blocking publish (slow subscribers
/// never block the reconciliation core), multiple concurrent subscribers, and
/// automatic cleanup when subscribers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReconcileEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    /// Emitting into the void is not an error for the core; callers use `.ok()`.
    pub fn emit(
        &self,
        event: ReconcileEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<ReconcileEvent>> {
        self.tx.send(event)
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
