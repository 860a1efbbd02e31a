//! Per-session stall detection.
//!
//! A session is stalled when it is active, has produced at least one
//! event, and has been silent for the threshold or longer. The
//! [`StallMonitor`] task re-evaluates that rule on a fixed poll interval and
//! publishes the result through its [`StallMonitorHandle`]. When the session
//! stops being active the flag clears and polling halts.
//!
//! Silence is measured on the tokio clock, so a paused runtime drives the
//! threshold deterministically.
//!
//! Transitions are optionally reported as [`StallEvent`]s on an `mpsc`
//! channel so the orchestrator can react.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use super::store::SessionStore;

/// Stall rule.
///
/// `last_event_at_ms == 0` means no event was ever observed and is never
/// stalled.
#[must_use]
pub fn is_stalled(last_event_at_ms: i64, is_active: bool, now_ms: i64, threshold: Duration) -> bool {
    if !is_active || last_event_at_ms <= 0 {
        return false;
    }
    let idle_ms = u64::try_from(now_ms.saturating_sub(last_event_at_ms)).unwrap_or(0);
    exceeds_threshold(Some(Duration::from_millis(idle_ms)), true, threshold)
}

/// Stall rule over a measured silence. `None` means no activity yet.
#[must_use]
pub fn exceeds_threshold(idle: Option<Duration>, is_active: bool, threshold: Duration) -> bool {
    is_active && idle.is_some_and(|idle| idle >= threshold)
}

/// Stall state changes reported by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StallEvent {
    /// The session went silent past the threshold.
    Stalled {
        /// Session that went silent.
        session_id: String,
        /// Milliseconds since the last event when detected.
        idle_ms: i64,
    },
    /// A stalled session produced an event again.
    Recovered {
        /// Session that recovered.
        session_id: String,
    },
}

/// Builder for a per-session stall monitor.
///
/// Call [`spawn`](Self::spawn) to start polling.
pub struct StallMonitor {
    session_id: String,
    poll_interval: Duration,
    threshold: Duration,
    store: SessionStore,
    event_tx: Option<mpsc::Sender<StallEvent>>,
    cancel: CancellationToken,
}

impl StallMonitor {
    /// Construct a new monitor (does not start polling yet).
    #[must_use]
    pub fn new(
        session_id: String,
        poll_interval: Duration,
        threshold: Duration,
        store: SessionStore,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            poll_interval,
            threshold,
            store,
            event_tx: None,
            cancel,
        }
    }

    /// Report stall transitions on `event_tx`.
    #[must_use]
    pub fn with_events(mut self, event_tx: mpsc::Sender<StallEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Spawn the polling task and return a handle to it.
    #[must_use]
    pub fn spawn(self) -> StallMonitorHandle {
        let stalled = Arc::new(AtomicBool::new(false));
        let cancel_for_handle = self.cancel.clone();
        let span = info_span!("stall_monitor", session_id = %self.session_id);

        let join_handle = tokio::spawn(
            Self::run(
                self.session_id.clone(),
                self.poll_interval,
                self.threshold,
                self.store,
                self.event_tx,
                self.cancel,
                Arc::clone(&stalled),
            )
            .instrument(span),
        );

        StallMonitorHandle {
            stalled,
            session_id: self.session_id,
            join_handle: Some(join_handle),
            cancel: cancel_for_handle,
        }
    }

    async fn run(
        session_id: String,
        poll_interval: Duration,
        threshold: Duration,
        store: SessionStore,
        event_tx: Option<mpsc::Sender<StallEvent>>,
        cancel: CancellationToken,
        stalled: Arc<AtomicBool>,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    stalled.store(false, Ordering::SeqCst);
                    debug!("stall monitor cancelled");
                    return;
                }
                () = tokio::time::sleep(poll_interval) => {}
            }

            let liveness = store.liveness(&session_id).await;
            if !liveness.is_active {
                stalled.store(false, Ordering::SeqCst);
                debug!("session no longer active, stall monitor stopping");
                return;
            }

            let now_stalled = exceeds_threshold(liveness.idle, true, threshold);
            let was_stalled = stalled.swap(now_stalled, Ordering::SeqCst);

            let event = match (was_stalled, now_stalled) {
                (false, true) => {
                    let idle_ms = liveness
                        .idle
                        .map_or(0, |idle| i64::try_from(idle.as_millis()).unwrap_or(i64::MAX));
                    info!(idle_ms, "stall detected");
                    Some(StallEvent::Stalled {
                        session_id: session_id.clone(),
                        idle_ms,
                    })
                }
                (true, false) => {
                    info!("session recovered");
                    Some(StallEvent::Recovered {
                        session_id: session_id.clone(),
                    })
                }
                _ => None,
            };

            if let (Some(event), Some(tx)) = (event, event_tx.as_ref()) {
                // Receiver gone only means nobody is listening for transitions.
                let _ = tx.send(event).await;
            }
        }
    }
}

/// Handle returned from [`StallMonitor::spawn`].
pub struct StallMonitorHandle {
    stalled: Arc<AtomicBool>,
    session_id: String,
    join_handle: Option<JoinHandle<()>>,
    /// Cancelled when the handle is dropped.
    cancel: CancellationToken,
}

impl Drop for StallMonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl StallMonitorHandle {
    /// Whether the session is currently considered stalled.
    ///
    /// Always `false` once the monitor is stopped.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        !self.cancel.is_cancelled() && self.stalled.load(Ordering::SeqCst)
    }

    /// The session this monitor watches.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stop polling. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.stalled.store(false, Ordering::SeqCst);
    }

    /// Stop polling and wait for the task to exit.
    pub async fn await_completion(mut self) {
        self.stop();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}
