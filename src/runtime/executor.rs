//! Session runtime executor

use super::traits::{AssessmentClient, AssessmentStore, Pacer};
use super::{SessionSnapshot, SseEvent};

use crate::db::{AssessmentRecord, AssessmentResult, ChatMessage};
use crate::state_machine::{transition, ConvState, Effect, Event, IntakeRecord, TransitionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic session runtime that can work with any store, assessment client and pacer
pub struct SessionRuntime<S, A, P>
where
    S: AssessmentStore + 'static,
    A: AssessmentClient + 'static,
    P: Pacer + 'static,
{
    session_id: String,
    state: ConvState,
    store: S,
    client: Arc<A>,
    pacer: P,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Set by the API when it queues user input; cleared once that input is handled
    input_pending: Arc<AtomicBool>,
    /// Token to cancel the running assessment request
    assessment_cancel_token: Option<CancellationToken>,
}

impl<S, A, P> SessionRuntime<S, A, P>
where
    S: AssessmentStore + 'static,
    A: AssessmentClient + 'static,
    P: Pacer + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        store: S,
        client: A,
        pacer: P,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        input_pending: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session_id,
            state: ConvState::default(),
            store,
            client: Arc::new(client),
            pacer,
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            input_pending,
            assessment_cancel_token: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting session runtime");

        // Events run to completion, typing pauses included, before the next one
        while let Some(event) = self.event_rx.recv().await {
            let is_input = event.input_text().is_some();
            self.process_event(event).await;
            if is_input {
                self.input_pending.store(false, Ordering::Release);
            }
        }

        if let Some(token) = self.assessment_cancel_token.take() {
            token.cancel();
        }
        tracing::info!(session_id = %self.session_id, "Session runtime stopped");
    }

    async fn process_event(&mut self, event: Event) {
        if let Event::AssessmentFailed {
            message,
            error_kind,
        } = &event
        {
            tracing::warn!(
                session_id = %self.session_id,
                error = %message,
                kind = error_kind.as_str(),
                "Assessment failed"
            );
        }

        let result = match transition(&self.state, event) {
            Ok(r) => r,
            Err(TransitionError::InvalidTransition(reason)) => {
                // Late assessment outcomes after a reset land here
                tracing::debug!(session_id = %self.session_id, %reason, "Ignoring event");
                return;
            }
            Err(e) => {
                tracing::info!(session_id = %self.session_id, error = %e, "Input rejected");
                self.broadcast(SseEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        self.state = result.new_state;

        // The typing indicator stays on from the assessment request until the
        // bot reply that follows its outcome
        let assessing = self.state.is_assessing();
        self.snapshot_tx.send_modify(|s| s.assessing = assessing);

        for effect in result.effects {
            self.execute_effect(effect).await;
        }
    }

    /// Execute an effect
    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendUserMessage { text } => {
                self.append_message(ChatMessage::user(text));
            }

            Effect::BotReply { text } => {
                self.set_typing(true);
                self.pacer.pause().await;
                self.append_message(ChatMessage::bot(text));
                self.set_typing(false);
            }

            Effect::SetQuickReplies { options } => {
                self.snapshot_tx.send_if_modified(|s| {
                    if s.quick_replies == options {
                        return false;
                    }
                    s.quick_replies.clone_from(&options);
                    self.broadcast(SseEvent::QuickReplies { options });
                    true
                });
            }

            Effect::RequestAssessment { intake } => {
                self.set_typing(true);
                self.spawn_assessment(intake);
            }

            Effect::AbortAssessment => {
                if let Some(token) = self.assessment_cancel_token.take() {
                    tracing::info!(session_id = %self.session_id, "Aborting assessment request");
                    token.cancel();
                }
                self.set_typing(false);
            }

            Effect::RecordAssessment { intake, result } => {
                self.record_assessment(&intake, result).await;
            }

            Effect::ResetTranscript { greeting } => {
                let mut fresh = SessionSnapshot::new(self.session_id.clone());
                fresh.transcript = vec![ChatMessage::bot(greeting)];
                self.snapshot_tx.send_modify(|s| {
                    *s = fresh.clone();
                    self.broadcast(SseEvent::Reset {
                        session: Box::new(fresh),
                    });
                });
            }

            Effect::NotifyStep => {
                let step = self.state.step;
                tracing::debug!(session_id = %self.session_id, step = %step, "Step changed");
                self.snapshot_tx.send_modify(|s| {
                    s.step = step;
                    self.broadcast(SseEvent::StepChange { step });
                });
            }
        }
    }

    /// Run the assessment call in the background; its outcome comes back as an event
    fn spawn_assessment(&mut self, intake: IntakeRecord) {
        let cancel_token = CancellationToken::new();
        self.assessment_cancel_token = Some(cancel_token.clone());

        let client = self.client.clone();
        let event_tx = self.event_tx.clone();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            tracing::info!(session_id = %session_id, "Requesting assessment (background)");

            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(session_id = %session_id, "Assessment request cancelled");
                }

                result = client.assess(&intake) => {
                    if cancel_token.is_cancelled() {
                        return;
                    }
                    let event = match result {
                        Ok(result) => Event::AssessmentReady { result },
                        Err(e) => Event::AssessmentFailed {
                            message: e.message,
                            error_kind: e.kind,
                        },
                    };
                    let _ = event_tx.send(event).await;
                }
            }
        });
    }

    /// Merge, archive and expose a completed assessment
    async fn record_assessment(&mut self, intake: &IntakeRecord, result: AssessmentResult) {
        self.assessment_cancel_token = None;

        let transcript = self.snapshot_tx.borrow().transcript.clone();
        let record = AssessmentRecord::new(
            uuid::Uuid::new_v4().to_string(),
            intake,
            result,
            transcript,
        );

        // Archival is best-effort; the user still sees the assessment
        match self.store.append(&record).await {
            Ok(id) => {
                tracing::info!(session_id = %self.session_id, assessment_id = %id, "Assessment archived");
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Failed to archive assessment");
            }
        }

        self.snapshot_tx.send_modify(|s| {
            s.latest_assessment = Some(record.clone());
            self.broadcast(SseEvent::Assessment {
                assessment: Box::new(record),
            });
        });
    }

    fn append_message(&self, message: ChatMessage) {
        self.snapshot_tx.send_modify(|s| {
            s.transcript.push(message.clone());
            self.broadcast(SseEvent::Message { message });
        });
    }

    fn set_typing(&self, is_typing: bool) {
        self.snapshot_tx.send_if_modified(|s| {
            if s.is_typing == is_typing {
                return false;
            }
            s.is_typing = is_typing;
            self.broadcast(SseEvent::Typing { is_typing });
            true
        });
    }

    /// Snapshot changes broadcast while the snapshot is still locked, so a
    /// subscriber that reads the snapshot under the same lock never sees an
    /// update twice
    fn broadcast(&self, event: SseEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}
