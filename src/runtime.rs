//! Runtime for executing symptom-check sessions
//!
//! Each session runs in its own task that feeds events through the state
//! machine and executes the resulting effects. Sessions never share state.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::db::{AssessmentRecord, ChatMessage};
use crate::state_machine::{script, Event, Step};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};

/// What a client renders for a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub step: Step,
    pub transcript: Vec<ChatMessage>,
    pub quick_replies: Vec<String>,
    pub is_typing: bool,
    pub assessing: bool,
    pub latest_assessment: Option<AssessmentRecord>,
}

impl SessionSnapshot {
    /// Fresh session showing the welcome message
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            step: Step::default(),
            transcript: vec![ChatMessage::bot(script::WELCOME)],
            quick_replies: Vec::new(),
            is_typing: false,
            assessing: false,
            latest_assessment: None,
        }
    }

    /// Input is not accepted while a reply is being typed or assessed
    pub fn is_busy(&self) -> bool {
        self.is_typing || self.assessing
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Message { message: ChatMessage },
    Typing { is_typing: bool },
    QuickReplies { options: Vec<String> },
    StepChange { step: Step },
    Assessment { assessment: Box<AssessmentRecord> },
    Reset { session: Box<SessionSnapshot> },
    Error { message: String },
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    input_pending: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Current rendering state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that observes every snapshot update
    #[allow(dead_code)] // Used in tests
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Current snapshot plus a receiver for every change made after it
    pub fn subscribe(&self) -> (SessionSnapshot, broadcast::Receiver<SseEvent>) {
        // The runtime broadcasts while holding the snapshot lock; holding the
        // read side here keeps the pair consistent
        let snapshot = self.snapshot_rx.borrow();
        let rx = self.broadcast_tx.subscribe();
        (snapshot.clone(), rx)
    }

    /// Claim the single input slot before queueing user text.
    ///
    /// Fails while earlier input is still queued or being answered, or while
    /// the session is typing or assessing. The runtime frees the slot once
    /// the claimed input has been fully handled.
    pub fn try_claim_input(&self) -> bool {
        if self
            .input_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if self.snapshot().is_busy() {
            self.release_input();
            return false;
        }
        true
    }

    /// Give back a claimed slot whose input was never queued
    pub fn release_input(&self) {
        self.input_pending.store(false, Ordering::Release);
    }
}

/// Manager for all session runtimes
pub struct SessionManager {
    store: Arc<dyn AssessmentStore>,
    client: Arc<dyn AssessmentClient>,
    pacer: Arc<dyn Pacer>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn AssessmentStore>,
        client: Arc<dyn AssessmentClient>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            store,
            client,
            pacer,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new session runtime
    pub async fn create_session(&self) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().to_string();

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::new(&session_id));
        let input_pending = Arc::new(AtomicBool::new(false));

        let runtime = SessionRuntime::new(
            session_id.clone(),
            self.store.clone(),
            self.client.clone(),
            self.pacer.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            snapshot_tx,
            input_pending.clone(),
        );

        let id = session_id.clone();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(session_id = %id, "Session runtime finished");
        });

        let handle = SessionHandle {
            event_tx,
            broadcast_tx,
            snapshot_rx,
            input_pending,
        };
        self.sessions
            .write()
            .await
            .insert(session_id, handle.clone());

        handle
    }

    /// Look up a running session
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Send an event to a session
    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), String> {
        let handle = self
            .get(session_id)
            .await
            .ok_or_else(|| format!("Session not found: {session_id}"))?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Archive of completed assessments
    pub fn store(&self) -> &Arc<dyn AssessmentStore> {
        &self.store
    }
}
