//! Mock implementations for testing
//!
//! These mocks drive the runtime without network or disk I/O.

use super::{ChatEvent, ChatHandle, Snapshot};
use crate::config::DispatchConfig;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::session::{ChatSession, DEFAULT_PASSPHRASE};
use crate::state_machine::DispatchState;
use crate::storage::MemoryKvStore;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock LLM service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

#[allow(dead_code)]
impl MockLlmService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_text(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(LlmResponse::from_text(text)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

impl Default for MockLlmService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.next(request)
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Gated Mock LLM Service (holds the request open)
// ============================================================================

/// Mock that blocks every request until `release` is notified
pub struct GatedLlmService {
    pub inner: MockLlmService,
    /// Notified when a request arrives
    pub request_started: Arc<Notify>,
    /// Notify once to let one pending request finish
    pub release: Arc<Notify>,
}

impl GatedLlmService {
    pub fn new() -> Self {
        Self {
            inner: MockLlmService::new(),
            request_started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl LlmService for GatedLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.request_started.notify_one();
        self.release.notified().await;
        self.inner.next(request)
    }

    fn model_id(&self) -> &str {
        "gated-mock-model"
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

pub struct TestRuntime {
    pub handle: ChatHandle,
    pub store: Arc<MemoryKvStore>,
    events: broadcast::Receiver<ChatEvent>,
}

impl TestRuntime {
    /// Start a runtime over a fresh store, optionally already unlocked
    pub async fn start(llm: Arc<dyn LlmService>, unlocked: bool) -> Self {
        Self::start_with_store(llm, Arc::new(MemoryKvStore::new()), unlocked).await
    }

    pub async fn start_with_store(
        llm: Arc<dyn LlmService>,
        store: Arc<MemoryKvStore>,
        unlocked: bool,
    ) -> Self {
        let session = ChatSession::load(Arc::clone(&store), DEFAULT_PASSPHRASE);
        let handle = ChatHandle::spawn(session, llm, DispatchConfig::default());
        let events = handle.subscribe();
        if unlocked {
            assert!(handle.authenticate(DEFAULT_PASSPHRASE).await.unwrap());
        }
        Self {
            handle,
            store,
            events,
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.handle.snapshot().await.unwrap()
    }

    /// Wait until the dispatcher reports it is idle again
    pub async fn wait_for_idle(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Ok(Ok(ChatEvent::StateChange {
                    state: DispatchState::Idle,
                })) => return true,
                Ok(Ok(_)) => {}
                Ok(Err(_)) | Err(_) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{RuntimeError, SubmitOutcome};
    use crate::session::{Sender, GREETING};
    use crate::storage::{KvStore, HISTORY_SLOT};
    use crate::state_machine::FALLBACK_REPLY;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_mock_llm_service() {
        let mock = MockLlmService::new();
        mock.queue_text("Hello");

        let request = LlmRequest::new("hi");
        let response = mock.complete(&request).await.unwrap();
        assert_eq!(response.text, "Hello");

        // Second call should fail (no more responses)
        assert!(mock.complete(&request).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_locked_session_refuses_chat() {
        let llm = Arc::new(MockLlmService::new());
        let rt = TestRuntime::start(llm.clone(), false).await;

        assert_eq!(
            rt.handle.submit(Some("hi".to_string())).await,
            Err(RuntimeError::Locked)
        );
        assert_eq!(rt.handle.clear(true).await, Err(RuntimeError::Locked));
        assert_eq!(rt.handle.set_draft("x").await, Err(RuntimeError::Locked));
        assert!(llm.recorded_requests().is_empty());

        let snapshot = rt.snapshot().await;
        assert!(!snapshot.authenticated);
        assert!(snapshot.messages.is_empty());
    }

    #[tokio::test]
    async fn test_login_seeds_greeting() {
        let rt = TestRuntime::start(Arc::new(MockLlmService::new()), false).await;

        assert!(!rt.handle.authenticate("wrong").await.unwrap());
        let snapshot = rt.snapshot().await;
        assert!(!snapshot.authenticated);
        assert!(snapshot.messages.is_empty());

        assert!(rt.handle.authenticate("hosna").await.unwrap());
        let snapshot = rt.snapshot().await;
        assert!(snapshot.authenticated);
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].text, GREETING);
    }

    #[tokio::test]
    async fn test_simple_turn() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_text("Salam!");

        let mut rt = TestRuntime::start(llm.clone(), true).await;
        let outcome = rt.handle.submit(Some("Hi".to_string())).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Queued { .. }));

        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.state, DispatchState::Idle);
        let msgs = &snapshot.messages;
        // Greeting + user + reply
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].sender, Sender::User);
        assert_eq!(msgs[1].text, "Hi");
        assert_eq!(msgs[2].sender, Sender::Assistant);
        assert_eq!(msgs[2].text, "Salam!");

        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.ends_with("Current message: Hi"));
        assert!(requests[0].prompt.contains("user: Hi"));
    }

    #[tokio::test]
    async fn test_blank_submit_is_ignored() {
        let llm = Arc::new(MockLlmService::new());
        let rt = TestRuntime::start(llm.clone(), true).await;

        for text in ["", "   "] {
            let outcome = rt.handle.submit(Some(text.to_string())).await.unwrap();
            assert_eq!(outcome, SubmitOutcome::Ignored);
        }
        // Empty draft as well
        assert_eq!(rt.handle.submit(None).await.unwrap(), SubmitOutcome::Ignored);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.state, DispatchState::Idle);
        assert!(llm.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_second_submit_ignored_while_awaiting() {
        let llm = Arc::new(GatedLlmService::new());
        llm.inner.queue_text("first reply");
        llm.inner.queue_text("never used");

        let mut rt = TestRuntime::start(llm.clone(), true).await;
        let first = rt.handle.submit(Some("one".to_string())).await.unwrap();
        let SubmitOutcome::Queued { message_id } = first else {
            panic!("first submit should be queued");
        };
        llm.request_started.notified().await;

        let snapshot = rt.snapshot().await;
        assert_eq!(
            snapshot.state,
            DispatchState::AwaitingResponse {
                message_id: message_id.clone()
            }
        );

        let second = rt.handle.submit(Some("two".to_string())).await.unwrap();
        assert_eq!(second, SubmitOutcome::Ignored);

        llm.release.notify_one();
        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        let texts: Vec<_> = snapshot.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, [GREETING, "one", "first reply"]);
        assert_eq!(llm.inner.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_appends_fallback_and_returns_idle() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_error(LlmError::network("Connection refused"));

        let mut rt = TestRuntime::start(llm, true).await;
        rt.handle.submit(Some("Hi".to_string())).await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.state, DispatchState::Idle);
        assert_eq!(snapshot.messages.len(), 3);
        let last = &snapshot.messages[2];
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_context_window_is_last_five() {
        let llm = Arc::new(MockLlmService::new());
        for i in 0..4 {
            llm.queue_text(&format!("reply {i}"));
        }

        let mut rt = TestRuntime::start(llm.clone(), true).await;
        // Greeting + 3 turns = 7 messages
        for i in 0..3 {
            rt.handle.submit(Some(format!("question {i}"))).await.unwrap();
            assert!(rt.wait_for_idle(WAIT).await);
        }
        assert_eq!(rt.snapshot().await.messages.len(), 7);

        rt.handle.submit(Some("question 3".to_string())).await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        let prompt = &llm.recorded_requests()[3].prompt;
        let transcript = prompt
            .split("Previous conversation:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap();
        let lines: Vec<_> = transcript.lines().collect();
        assert_eq!(
            lines,
            [
                "user: question 1",
                "assistant: reply 1",
                "user: question 2",
                "assistant: reply 2",
                "user: question 3",
            ]
        );
    }

    #[tokio::test]
    async fn test_reply_target_is_recorded_and_quoted() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_text("Sure");

        let mut rt = TestRuntime::start(llm.clone(), true).await;
        let greeting_id = rt.snapshot().await.messages[0].id.clone();

        rt.handle.set_reply_target(greeting_id.clone()).await.unwrap();
        assert_eq!(
            rt.snapshot().await.reply_target.as_deref(),
            Some(greeting_id.as_str())
        );

        rt.handle.submit(Some("Tell me more".to_string())).await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.reply_target, None);
        assert_eq!(snapshot.messages[1].reply_to.as_deref(), Some(greeting_id.as_str()));

        let prompt = &llm.recorded_requests()[0].prompt;
        assert!(prompt.contains(&format!("In reply to message: \"{GREETING}\"")));
    }

    #[tokio::test]
    async fn test_message_event_carries_reply_quote() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_text("Sure");

        let rt = TestRuntime::start(llm, true).await;
        let mut events = rt.handle.subscribe();
        let greeting_id = rt.snapshot().await.messages[0].id.clone();
        rt.handle.set_reply_target(greeting_id.clone()).await.unwrap();
        rt.handle.submit(Some("Tell me more".to_string())).await.unwrap();

        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .unwrap()
            .unwrap();
        let ChatEvent::Message {
            message,
            reply_quote,
        } = event
        else {
            panic!("expected the user message first");
        };
        assert_eq!(message.reply_to.as_deref(), Some(greeting_id.as_str()));
        assert_eq!(reply_quote.as_deref(), Some(GREETING));
    }

    #[tokio::test]
    async fn test_repeat_login_keeps_cleared_history_empty() {
        let rt = TestRuntime::start(Arc::new(MockLlmService::new()), true).await;
        assert!(rt.handle.clear(true).await.unwrap());

        assert!(rt.handle.authenticate("hosna").await.unwrap());
        assert!(rt.snapshot().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_reply_target_rejected() {
        let rt = TestRuntime::start(Arc::new(MockLlmService::new()), true).await;
        assert_eq!(
            rt.handle.set_reply_target("missing").await,
            Err(RuntimeError::UnknownMessage("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancel_reply_target() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_text("ok");

        let mut rt = TestRuntime::start(llm.clone(), true).await;
        let greeting_id = rt.snapshot().await.messages[0].id.clone();
        rt.handle.set_reply_target(greeting_id).await.unwrap();
        rt.handle.cancel_reply().await.unwrap();

        rt.handle.submit(Some("plain".to_string())).await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        assert_eq!(rt.snapshot().await.messages[1].reply_to, None);
        assert!(!llm.recorded_requests()[0].prompt.contains("In reply to message"));
    }

    #[tokio::test]
    async fn test_draft_submission_resets_composer() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_text("ok");

        let mut rt = TestRuntime::start(llm, true).await;
        rt.handle.set_draft("from the draft").await.unwrap();
        assert_eq!(rt.snapshot().await.draft, "from the draft");

        rt.handle.submit(None).await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.draft, "");
        assert_eq!(snapshot.messages[1].text, "from the draft");
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation_and_persists() {
        let rt = TestRuntime::start(Arc::new(MockLlmService::new()), true).await;

        assert!(!rt.handle.clear(false).await.unwrap());
        assert_eq!(rt.snapshot().await.messages.len(), 1);

        assert!(rt.handle.clear(true).await.unwrap());
        assert!(rt.snapshot().await.messages.is_empty());

        let raw = rt.store.get(HISTORY_SLOT).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["messages"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let llm = Arc::new(MockLlmService::new());
        llm.queue_text("remembered");

        let mut rt = TestRuntime::start(llm, true).await;
        rt.handle.submit(Some("hello".to_string())).await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);
        let before = rt.snapshot().await.messages;

        let restarted = TestRuntime::start_with_store(
            Arc::new(MockLlmService::new()),
            Arc::clone(&rt.store),
            false,
        )
        .await;
        let snapshot = restarted.snapshot().await;
        assert!(snapshot.authenticated);
        assert_eq!(snapshot.messages, before);
        assert_eq!(snapshot.state, DispatchState::Idle);
    }
}
