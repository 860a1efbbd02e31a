//! Backend event subscription channel.
//!
//! The environment delivers raw agent records and session lifecycle
//! signals through a [`SignalSource`]. Delivery is ordered per session and
//! lossless. [`SignalBus`] is the in-process implementation: every
//! subscription owns a bounded [`mpsc`] queue, and a full queue makes the
//! publisher wait instead of dropping signals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::session::SessionUsage;
use crate::{AppError, Result};

/// Default number of queued signals per subscriber before publishers wait.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Signals delivered by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendSignal {
    /// One raw record emitted by an agent process.
    AgentOutput {
        /// Session the record belongs to.
        session_id: String,
        /// Record kind (the record's `type`).
        record_kind: String,
        /// Untouched record payload.
        payload: Value,
    },
    /// The agent process finished its task.
    SessionCompleted {
        /// Session that completed.
        session_id: String,
        /// Whether the final message asks the user something.
        needs_input: bool,
        /// Final result text, truncated.
        last_result: Option<String>,
        /// Token and cost totals from the final result record.
        usage: Option<SessionUsage>,
    },
    /// The session was stopped.
    SessionCancelled {
        /// Session that was cancelled.
        session_id: String,
    },
    /// The agent process reported its own session identifier.
    ExternalSessionAssigned {
        /// Session the identifier belongs to.
        session_id: String,
        /// Identifier assigned by the agent process.
        external_session_id: String,
    },
}

impl BackendSignal {
    /// Session the signal is addressed to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::AgentOutput { session_id, .. }
            | Self::SessionCompleted { session_id, .. }
            | Self::SessionCancelled { session_id }
            | Self::ExternalSessionAssigned { session_id, .. } => session_id,
        }
    }
}

/// Source of backend signals.
pub trait SignalSource: Send + Sync {
    /// Open a new subscription. Dropping the receiver unsubscribes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Subscription`] if the source no longer accepts subscribers.
    fn subscribe(&self) -> Result<mpsc::Receiver<BackendSignal>>;
}

/// In-process fan-out bus for backend signals.
#[derive(Debug, Clone)]
pub struct SignalBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<BackendSignal>>>>,
    capacity: usize,
    closed: Arc<AtomicBool>,
}

impl SignalBus {
    /// Create a bus with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus queueing up to `capacity` signals per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver a signal to every current subscriber, in subscription order.
    ///
    /// Waits while a subscriber's queue is full. Returns the number of
    /// subscribers that received it; zero when nobody is listening or the
    /// bus is closed.
    pub async fn publish(&self, signal: BackendSignal) -> usize {
        if self.closed.load(Ordering::SeqCst) {
            debug!(session_id = signal.session_id(), "signal bus closed, dropping signal");
            return 0;
        }
        let mut delivered = 0;
        for tx in self.live_senders() {
            if tx.send(signal.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Stop accepting subscribers and publications.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.live_senders().len()
    }

    /// Prune dropped subscriptions and return the remaining senders.
    fn live_senders(&self) -> Vec<mpsc::Sender<BackendSignal>> {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.clone()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for SignalBus {
    fn subscribe(&self) -> Result<mpsc::Receiver<BackendSignal>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::Subscription("signal bus is closed".into()));
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Ok(rx)
    }
}
