//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{SessionHandle, SessionManager, SessionSnapshot, SseEvent};
use crate::db::{AssessmentRecord, AssessmentResult, Confidence, PossibleCondition};
use crate::llm::LlmError;
use crate::state_machine::{Event, IntakeRecord};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock Assessment Client
// ============================================================================

/// Mock assessment client that returns queued outcomes
pub struct MockAssessmentClient {
    outcomes: Mutex<VecDeque<Result<AssessmentResult, LlmError>>>,
    /// Record of all intakes assessed
    pub requests: Mutex<Vec<IntakeRecord>>,
}

impl MockAssessmentClient {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful assessment
    pub fn queue_result(&self, result: AssessmentResult) {
        self.outcomes.lock().unwrap().push_back(Ok(result));
    }

    /// Queue a failure
    pub fn queue_error(&self, error: LlmError) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<IntakeRecord> {
        self.requests.lock().unwrap().clone()
    }

    fn next_outcome(&self, intake: &IntakeRecord) -> Result<AssessmentResult, LlmError> {
        self.requests.lock().unwrap().push(intake.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock assessment queued")))
    }
}

impl Default for MockAssessmentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssessmentClient for MockAssessmentClient {
    async fn assess(&self, intake: &IntakeRecord) -> Result<AssessmentResult, LlmError> {
        self.next_outcome(intake)
    }
}

// ============================================================================
// Gated Mock Assessment Client (for cancellation testing)
// ============================================================================

/// Mock assessment client that holds each request until released
pub struct GatedAssessmentClient {
    inner: MockAssessmentClient,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
    /// Notify to let a held request finish
    pub release: Arc<Notify>,
}

impl GatedAssessmentClient {
    pub fn new() -> Self {
        Self {
            inner: MockAssessmentClient::new(),
            request_started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    pub fn queue_result(&self, result: AssessmentResult) {
        self.inner.queue_result(result);
    }

    pub fn recorded_requests(&self) -> Vec<IntakeRecord> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl AssessmentClient for GatedAssessmentClient {
    async fn assess(&self, intake: &IntakeRecord) -> Result<AssessmentResult, LlmError> {
        self.request_started.notify_one();
        self.release.notified().await;
        self.inner.next_outcome(intake)
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory assessment archive, optionally failing every write
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<AssessmentRecord>>,
    fail_writes: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_writes: true,
        }
    }

    pub fn records(&self) -> Vec<AssessmentRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssessmentStore for InMemoryStore {
    async fn append(&self, record: &AssessmentRecord) -> Result<String, String> {
        if self.fail_writes {
            return Err("disk full".to_string());
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(record.id.clone())
    }

    async fn list(&self) -> Result<Vec<AssessmentRecord>, String> {
        let mut records = self.records();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<Option<AssessmentRecord>, String> {
        Ok(self.records().into_iter().find(|r| r.id == id))
    }

    async fn delete(&self, id: &str) -> Result<bool, String> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}

// ============================================================================
// Instant Pacer
// ============================================================================

/// Pacer with no delay
pub struct InstantPacer;

#[async_trait]
impl Pacer for InstantPacer {
    async fn pause(&self) {}
}

// ============================================================================
// Test Session Helper
// ============================================================================

/// One-condition result used across runtime tests
pub fn migraine_result() -> AssessmentResult {
    AssessmentResult {
        possible_conditions: vec![PossibleCondition {
            condition: "Migraine".to_string(),
            confidence: Confidence::High,
            description: "Recurring headache with nausea".to_string(),
        }],
        recommendations: vec!["Rest in a dark, quiet room".to_string()],
        notes: String::new(),
    }
}

/// Helper for driving a session with minimal boilerplate
pub struct TestSession<A: AssessmentClient + 'static> {
    pub manager: Arc<SessionManager>,
    pub store: Arc<InMemoryStore>,
    pub client: Arc<A>,
    pub handle: SessionHandle,
    pub events: broadcast::Receiver<SseEvent>,
}

impl TestSession<MockAssessmentClient> {
    pub async fn new() -> Self {
        Self::with(MockAssessmentClient::new(), InMemoryStore::new()).await
    }
}

impl<A: AssessmentClient + 'static> TestSession<A> {
    pub async fn with(client: A, store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        let client = Arc::new(client);
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            client.clone(),
            Arc::new(InstantPacer),
        ));
        let handle = manager.create_session().await;
        let (_, events) = handle.subscribe();

        Self {
            manager,
            store,
            client,
            handle,
            events,
        }
    }

    pub async fn send(&self, event: Event) {
        self.handle
            .event_tx
            .send(event)
            .await
            .expect("Failed to send event");
    }

    pub async fn input(&self, text: &str) {
        self.send(Event::user_input(text)).await;
    }

    pub async fn quick_reply(&self, text: &str) {
        self.send(Event::quick_reply(text)).await;
    }

    /// Wait until the snapshot satisfies a predicate
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = self.handle.watch();
        let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
            .await
            .expect("Timed out waiting for session state")
            .expect("Session runtime stopped")
            .clone();
        snapshot
    }

    /// Wait for the next error event
    pub async fn next_error(&mut self) -> String {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.events.recv()).await {
                Ok(Ok(SseEvent::Error { message })) => return message,
                _ => continue,
            }
        }
        panic!("No error event received");
    }

    pub fn bot_messages(&self) -> Vec<String> {
        self.handle
            .snapshot()
            .transcript
            .into_iter()
            .filter(|m| m.role == crate::db::ChatRole::Bot)
            .map(|m| m.text)
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChatRole;
    use crate::state_machine::{script, Severity, Step};

    /// Completion is visible once the follow-up quick replies are offered
    fn is_complete(s: &SessionSnapshot) -> bool {
        s.step == Step::Complete && !s.quick_replies.is_empty()
    }

    fn last_bot_text(s: &SessionSnapshot) -> Option<&str> {
        s.transcript
            .last()
            .filter(|m| m.role == ChatRole::Bot)
            .map(|m| m.text.as_str())
    }

    async fn walk_to_assessment<A: AssessmentClient + 'static>(session: &TestSession<A>) {
        session.input("headache").await;
        session.wait_for(|s| s.step == Step::Duration).await;
        session.input("2 days").await;
        session.wait_for(|s| s.step == Step::Severity).await;
        session.quick_reply("7-8 (Severe)").await;
        session
            .wait_for(|s| s.step == Step::AdditionalSymptoms && !s.is_typing)
            .await;
        session.input("also nausea").await;
    }

    #[tokio::test]
    async fn test_new_session_shows_welcome() {
        let session = TestSession::new().await;
        let snapshot = session.handle.snapshot();

        assert_eq!(snapshot.step, Step::Greeting);
        assert_eq!(snapshot.transcript.len(), 1);
        assert_eq!(snapshot.transcript[0].text, script::WELCOME);
        assert!(snapshot.quick_replies.is_empty());
        assert!(!snapshot.is_busy());
    }

    #[tokio::test]
    async fn test_end_to_end_headache_scenario() {
        let session = TestSession::new().await;
        session.client.queue_result(migraine_result());

        walk_to_assessment(&session).await;
        let done = session.wait_for(is_complete).await;

        let records = session.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Severe);
        assert_eq!(records[0].symptoms, vec!["headache", "also nausea"]);
        assert_eq!(records[0].duration, "2 days");
        assert_eq!(records[0].possible_conditions[0].condition, "Migraine");

        // The archived transcript ends with the last user answer
        let archived = &records[0].chat_history;
        assert_eq!(archived.last().unwrap().role, ChatRole::User);
        assert_eq!(archived.last().unwrap().text, "also nausea");

        assert_eq!(done.latest_assessment.as_ref().unwrap().id, records[0].id);
        assert!(!done.assessing);
        assert_eq!(
            done.quick_replies,
            script::POST_ASSESSMENT_OPTIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect::<Vec<_>>()
        );
        assert_eq!(
            session.bot_messages().last().map(String::as_str),
            Some(script::ASSESSMENT_COMPLETE)
        );
        assert_eq!(session.client.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_emergency_severity_warns() {
        let session = TestSession::new().await;
        session.input("chest pain").await;
        session.wait_for(|s| s.step == Step::Duration).await;
        session.quick_reply("A few hours").await;
        session.wait_for(|s| s.step == Step::Severity).await;
        session.quick_reply("9-10 (Emergency)").await;
        session
            .wait_for(|s| last_bot_text(s) == Some(script::ASK_ADDITIONAL_SYMPTOMS))
            .await;

        let bot = session.bot_messages();
        let n = bot.len();
        assert_eq!(bot[n - 2], script::EMERGENCY_WARNING);
        assert_eq!(bot[n - 1], script::ASK_ADDITIONAL_SYMPTOMS);
    }

    #[tokio::test]
    async fn test_assessment_failure_apologizes_once() {
        let session = TestSession::new().await;
        session.client.queue_error(LlmError::server_error("boom"));

        walk_to_assessment(&session).await;
        let stalled = session
            .wait_for(|s| !s.is_typing && last_bot_text(s) == Some(script::ASSESSMENT_UNAVAILABLE))
            .await;

        assert_eq!(stalled.step, Step::AdditionalSymptoms);
        assert!(stalled.quick_replies.is_empty());
        assert!(stalled.latest_assessment.is_none());
        assert!(session.store.records().is_empty());

        let apologies = session
            .bot_messages()
            .iter()
            .filter(|m| m.as_str() == script::ASSESSMENT_UNAVAILABLE)
            .count();
        assert_eq!(apologies, 1);
    }

    #[tokio::test]
    async fn test_input_after_failure_is_rejected() {
        let mut session = TestSession::new().await;
        session.client.queue_error(LlmError::network("offline"));

        walk_to_assessment(&session).await;
        session
            .wait_for(|s| !s.is_typing && last_bot_text(s) == Some(script::ASSESSMENT_UNAVAILABLE))
            .await;

        let before = session.handle.snapshot().transcript.len();
        session.input("hello?").await;
        let error = session.next_error().await;

        assert!(error.contains("start a new check"));
        assert_eq!(session.handle.snapshot().transcript.len(), before);
        assert_eq!(session.client.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_shows_assessment() {
        let client = MockAssessmentClient::new();
        client.queue_result(migraine_result());
        let session = TestSession::with(client, InMemoryStore::failing()).await;

        walk_to_assessment(&session).await;
        let done = session.wait_for(is_complete).await;

        assert!(session.store.records().is_empty());
        let shown = done.latest_assessment.expect("assessment should be shown");
        assert_eq!(shown.possible_conditions, migraine_result().possible_conditions);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let session = TestSession::new().await;
        session.input("   ").await;
        session.quick_reply("").await;
        session.input("headache").await;
        let snapshot = session
            .wait_for(|s| s.step == Step::Duration && !s.quick_replies.is_empty())
            .await;

        // welcome, the one real answer and the duration question
        assert_eq!(snapshot.transcript.len(), 3);
        assert_eq!(snapshot.transcript[1].text, "headache");
    }

    #[tokio::test]
    async fn test_reset_during_assessment_discards_result() {
        let client = GatedAssessmentClient::new();
        client.queue_result(migraine_result());
        let request_started = client.request_started.clone();
        let release = client.release.clone();
        let session = TestSession::with(client, InMemoryStore::new()).await;

        walk_to_assessment(&session).await;
        tokio::time::timeout(Duration::from_secs(2), request_started.notified())
            .await
            .expect("assessment request should start");
        assert!(session.handle.snapshot().assessing);

        session.send(Event::Reset).await;
        let fresh = session
            .wait_for(|s| s.step == Step::Greeting && s.transcript.len() == 1)
            .await;
        release.notify_one();

        assert_eq!(fresh.transcript.len(), 1);
        assert_eq!(fresh.transcript[0].text, script::RESTART_GREETING);
        assert!(fresh.latest_assessment.is_none());

        // The session keeps working from the greeting
        session.input("cough").await;
        let next = session
            .wait_for(|s| s.step == Step::Duration && s.transcript.len() == 3)
            .await;
        assert_eq!(next.transcript[1].text, "cough");
        assert!(session.store.records().is_empty());
        assert_eq!(session.client.recorded_requests().len(), 0);
    }

    #[tokio::test]
    async fn test_start_new_check_after_completion() {
        let session = TestSession::new().await;
        session.client.queue_result(migraine_result());

        walk_to_assessment(&session).await;
        session.wait_for(is_complete).await;

        session.quick_reply("Emergency contacts").await;
        session
            .wait_for(|s| last_bot_text(s) == Some(script::EMERGENCY_CONTACTS))
            .await;

        session.quick_reply("Start new check").await;
        let fresh = session
            .wait_for(|s| s.step == Step::Greeting && s.transcript.len() == 1)
            .await;

        assert_eq!(fresh.transcript.len(), 1);
        assert!(fresh.quick_replies.is_empty());
        assert_eq!(session.store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let session = TestSession::new().await;
        let other = session.manager.create_session().await;

        session.input("rash").await;
        session.wait_for(|s| s.step == Step::Duration).await;

        let untouched = other.snapshot();
        assert_ne!(untouched.session_id, session.handle.snapshot().session_id);
        assert_eq!(untouched.step, Step::Greeting);
        assert_eq!(untouched.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_input_slot_is_exclusive_until_reply_delivered() {
        let session = TestSession::new().await;
        assert!(session.handle.try_claim_input());
        assert!(!session.handle.try_claim_input());

        session.input("headache").await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while !session.handle.try_claim_input() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("slot should free up once the reply is delivered");

        let snapshot = session.handle.snapshot();
        assert_eq!(snapshot.step, Step::Duration);
        assert_eq!(last_bot_text(&snapshot), Some(script::ASK_DURATION));
    }

    #[tokio::test]
    async fn test_input_slot_refused_while_assessing() {
        let client = GatedAssessmentClient::new();
        client.queue_result(migraine_result());
        let request_started = client.request_started.clone();
        let release = client.release.clone();
        let session = TestSession::with(client, InMemoryStore::new()).await;

        walk_to_assessment(&session).await;
        tokio::time::timeout(Duration::from_secs(2), request_started.notified())
            .await
            .expect("assessment request should start");
        assert!(!session.handle.try_claim_input());

        release.notify_one();
        session.wait_for(|s| is_complete(s) && !s.is_typing).await;
        assert!(session.handle.try_claim_input());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscriber_never_receives_what_its_snapshot_shows() {
        let session = TestSession::new().await;
        session.client.queue_result(migraine_result());

        let handle = session.handle.clone();
        let subscriber = tokio::spawn(async move {
            let mut pairs = Vec::new();
            while !is_complete(&handle.snapshot()) && pairs.len() < 10_000 {
                pairs.push(handle.subscribe());
                tokio::task::yield_now().await;
            }
            pairs
        });

        walk_to_assessment(&session).await;
        session.wait_for(is_complete).await;
        let pairs = subscriber.await.unwrap();

        for (snapshot, mut rx) in pairs {
            while let Ok(event) = rx.try_recv() {
                if let SseEvent::Message { message } = event {
                    assert!(
                        !snapshot.transcript.contains(&message),
                        "{:?} delivered twice",
                        message.text
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new();
        let intake = IntakeRecord::default();
        let record = AssessmentRecord::new("a-1", &intake, migraine_result(), vec![]);

        assert_eq!(store.append(&record).await.unwrap(), "a-1");
        assert!(store.get("a-1").await.unwrap().is_some());
        assert!(store.delete("a-1").await.unwrap());
        assert!(!store.delete("a-1").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }
}
