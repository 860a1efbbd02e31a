//! Event router: backend signals → translator → session store.
//!
//! One router task runs per session, consuming its own subscription to the
//! backend signal channel. Signals are applied strictly in delivery order.
//! A failure while applying one record is logged and skipped; only
//! cancellation of the session scope or a closed channel ends the task.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::store::SessionStore;
use crate::backend::signals::BackendSignal;
use crate::backend::Backend;
use crate::config::{Preferences, TimingConfig};
use crate::models::agent::AgentStatus;
use crate::models::event::EventKind;
use crate::protocol::record::first_str;
use crate::protocol::translator::translate_for_runtime;
use crate::{AppError, Result};

/// Raw record kinds that count as work even when they translate to nothing.
const ACTIVE_WORK_KINDS: &[&str] = &["assistant", "user", "tool_use", "tool_result"];

/// Per-session router configuration.
pub struct EventRouter {
    session_id: String,
    runtime: String,
    generation: u64,
    store: SessionStore,
    backend: Arc<dyn Backend>,
    preferences: Arc<Preferences>,
    timing: TimingConfig,
    scope: CancellationToken,
    shutdown: CancellationToken,
}

impl EventRouter {
    /// Construct a router for one session.
    ///
    /// `scope` is the session scope: the router cancels it when the session
    /// ends. `shutdown` bounds the delayed working-memory clear, which must
    /// outlive the session scope.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        runtime: String,
        generation: u64,
        store: SessionStore,
        backend: Arc<dyn Backend>,
        preferences: Arc<Preferences>,
        timing: TimingConfig,
        scope: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            runtime,
            generation,
            store,
            backend,
            preferences,
            timing,
            scope,
            shutdown,
        }
    }

    /// Spawn the routing task over `signals`.
    #[must_use]
    pub fn spawn(self, signals: mpsc::Receiver<BackendSignal>) -> RouterHandle {
        let cancel = self.scope.clone();
        let span = info_span!("event_router", session_id = %self.session_id);
        let join_handle = tokio::spawn(self.run(signals).instrument(span));
        RouterHandle {
            cancel,
            join_handle: Some(join_handle),
        }
    }

    async fn run(self, mut signals: mpsc::Receiver<BackendSignal>) {
        loop {
            let received = tokio::select! {
                biased;
                () = self.scope.cancelled() => {
                    debug!("router cancelled");
                    return;
                }
                received = signals.recv() => received,
            };

            let Some(signal) = received else {
                info!("signal channel closed, router stopping");
                return;
            };
            if signal.session_id() != self.session_id {
                continue;
            }
            if let Err(err) = self.apply(signal).await {
                warn!(%err, "failed to apply backend signal, skipping");
            }
        }
    }

    async fn apply(&self, signal: BackendSignal) -> Result<()> {
        match signal {
            BackendSignal::AgentOutput {
                record_kind,
                payload,
                ..
            } => self.apply_record(&record_kind, payload).await,
            BackendSignal::SessionCompleted {
                needs_input,
                last_result,
                usage,
                ..
            } => {
                if self
                    .store
                    .complete(&self.session_id, needs_input, last_result, usage)
                    .await?
                {
                    self.spawn_memory_extraction();
                    self.end_session(Duration::from_millis(self.timing.complete_clear_delay_ms));
                }
                Ok(())
            }
            BackendSignal::SessionCancelled { .. } => {
                if self.store.cancel(&self.session_id).await? {
                    self.end_session(Duration::from_millis(self.timing.cancel_clear_delay_ms));
                }
                Ok(())
            }
            BackendSignal::ExternalSessionAssigned {
                external_session_id,
                ..
            } => {
                debug!(external_session_id, "external session id assigned");
                self.store
                    .set_external_id(&self.session_id, external_session_id)
                    .await
            }
        }
    }

    async fn apply_record(&self, record_kind: &str, payload: Value) -> Result<()> {
        let session_id = self.session_id.as_str();
        self.store.mark_record_seen(session_id).await?;

        let hint = first_str(&payload, &["agent", "agentName"]).map(str::to_owned);
        let owner = self.store.owning_agent(session_id, hint.as_deref()).await?;

        let events = translate_for_runtime(&self.runtime, record_kind, payload);
        if events.is_empty() {
            if ACTIVE_WORK_KINDS.contains(&record_kind) {
                self.move_agent(&owner, AgentStatus::Working).await?;
            }
            return Ok(());
        }

        for event in events {
            if let Some(tool) = event.tool_name() {
                self.store.record_tool(session_id, &owner, tool).await?;
            }
            let kind = event.kind();
            self.store
                .append_event(session_id, &owner, kind, event.payload())
                .await?;
            let target = if kind == EventKind::Thinking {
                AgentStatus::Thinking
            } else {
                AgentStatus::Working
            };
            self.move_agent(&owner, target).await?;
        }
        Ok(())
    }

    /// Status change for an agent; a rejected transition is skipped.
    async fn move_agent(&self, agent_id: &str, status: AgentStatus) -> Result<()> {
        match self
            .store
            .transition_agent(&self.session_id, agent_id, status)
            .await
        {
            Ok(_) => Ok(()),
            Err(AppError::InvalidTransition(msg)) => {
                debug!(agent_id, msg, "status transition rejected, skipping");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn spawn_memory_extraction(&self) {
        if !self.preferences.auto_learn() {
            return;
        }
        let backend = Arc::clone(&self.backend);
        let session_id = self.session_id.clone();
        tokio::spawn(
            async move {
                if let Err(err) = backend.extract_session_memories(&session_id).await {
                    warn!(%err, "memory extraction failed");
                }
            }
            .instrument(info_span!("memory_extraction")),
        );
    }

    /// Tear down the session scope and clear working memory after `delay`.
    fn end_session(&self, delay: Duration) {
        self.scope.cancel();
        let store = self.store.clone();
        let generation = self.generation;
        let shutdown = self.shutdown.clone();
        tokio::spawn(
            async move {
                tokio::select! {
                    () = shutdown.cancelled() => {}
                    () = tokio::time::sleep(delay) => {
                        store.clear_if(generation).await;
                    }
                }
            }
            .in_current_span(),
        );
    }
}

/// Handle to a running router task.
pub struct RouterHandle {
    cancel: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl Drop for RouterHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl RouterHandle {
    /// Unsubscribe and stop the router. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the router has stopped or been asked to stop.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
            || self
                .join_handle
                .as_ref()
                .is_none_or(JoinHandle::is_finished)
    }

    /// Stop the router and wait for the task to exit.
    pub async fn await_completion(mut self) {
        self.stop();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}
