//! Session controller.
//!
//! `ChatSession` owns the conversation state and the current content
//! descriptor, sequences the phase transitions, and enforces single-flight
//! request discipline. It is designed for one logical session driven by a
//! single caller; the pending flag is advisory and checked under the state
//! lock, not an atomic gate.

use crate::gemini::InferenceBackend;
use crate::prompt;
use docchat_core::content::ContentDescriptor;
use docchat_core::conversation::{ConversationState, Phase, Turn};
use docchat_core::error::StateError;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of a `send_message` call. Rejections are deliberate no-ops, not
/// errors: the session is left exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// A model turn (or an in-band error turn) was appended.
    Answered,
    /// Rejected: a request is already in flight (single-flight).
    Busy,
    /// Rejected: the input was empty or whitespace-only.
    EmptyInput,
    /// The session was reset while the request was in flight; the stale
    /// response was discarded.
    Stale,
}

struct SessionInner {
    state: ConversationState,
    content: Option<ContentDescriptor>,
}

/// Orchestrates one upload-and-conversation session.
pub struct ChatSession<B: InferenceBackend> {
    inner: Arc<RwLock<SessionInner>>,
    backend: Arc<B>,
}

impl<B: InferenceBackend> Clone for ChatSession<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            backend: self.backend.clone(),
        }
    }
}

impl<B: InferenceBackend> ChatSession<B> {
    /// Creates an empty session over the given inference backend.
    pub fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner {
                state: ConversationState::new(),
                content: None,
            })),
            backend: Arc::new(backend),
        }
    }

    /// Loads a validated content descriptor, replacing any previous one.
    ///
    /// Allowed in `Empty` and `Ready`; once chat is `Active` the session
    /// must be reset before new content can be loaded.
    pub async fn load_content(&self, descriptor: ContentDescriptor) -> Result<(), StateError> {
        let mut inner = self.inner.write().await;
        inner.state.set_phase(Phase::Ready)?;
        inner.content = Some(descriptor);
        Ok(())
    }

    /// Starts the chat: `Ready -> Active`, appending one synthesized model
    /// greeting that references the loaded document's display name.
    ///
    /// # Errors
    ///
    /// [`StateError::NoContent`] when no document is loaded;
    /// [`StateError::InvalidTransition`] when chat is already active.
    pub async fn start_chat(&self) -> Result<(), StateError> {
        let mut inner = self.inner.write().await;

        let display_name = match inner.content.as_ref() {
            Some(descriptor) => descriptor.display_name.clone(),
            None => return Err(StateError::NoContent),
        };

        inner.state.set_phase(Phase::Active)?;
        inner.state.append_turn(Turn::model(format!(
            "Ready! I've loaded the document \"{display_name}\". Ask me anything about it."
        )));
        Ok(())
    }

    /// Sends a user message and appends the backend's answer.
    ///
    /// The self-transition on `Active`: appends the user turn, marks the
    /// request pending, assembles the payload from the pre-append
    /// transcript, and issues exactly one backend call. Inference failures
    /// are converted into an in-band model turn and recorded as the
    /// side-channel error signal; they are never returned to the caller.
    ///
    /// A reset issued while the call is outstanding bumps the generation;
    /// the response is then discarded on arrival instead of being applied
    /// to the new session.
    pub async fn send_message(&self, input: &str) -> Result<SendOutcome, StateError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(SendOutcome::EmptyInput);
        }

        let (request, generation) = {
            let mut inner = self.inner.write().await;

            if inner.state.phase() != Phase::Active {
                return Err(StateError::InvalidTransition {
                    from: inner.state.phase(),
                    to: Phase::Active,
                });
            }
            if inner.state.pending_request() {
                return Ok(SendOutcome::Busy);
            }

            let descriptor = inner.content.clone().ok_or(StateError::NoContent)?;

            // Prior turns exclude the locally synthesized greeting at
            // index 0; the new question travels separately.
            let prior: Vec<Turn> = inner.state.transcript().iter().skip(1).cloned().collect();
            let request = prompt::assemble(&descriptor, &prior, trimmed);

            inner.state.append_turn(Turn::user(trimmed));
            inner.state.set_pending(true);
            (request, inner.state.generation())
        };

        // The lock is not held across the network call.
        let result = self.backend.generate(request).await;

        let mut inner = self.inner.write().await;

        if inner.state.generation() != generation {
            tracing::debug!("discarding stale inference response after reset");
            return Ok(SendOutcome::Stale);
        }

        match result {
            Ok(turn) => inner.state.append_turn(turn),
            Err(err) => {
                tracing::warn!(%err, "inference call failed");
                inner.state.set_last_error(err.to_string());
                inner
                    .state
                    .append_turn(Turn::model(format!("Sorry, something went wrong. {err}")));
            }
        }
        inner.state.set_pending(false);

        Ok(SendOutcome::Answered)
    }

    /// Full reset back to `Empty`: clears the transcript, the content
    /// descriptor, the pending flag, and the error signal. Idempotent.
    /// Any in-flight response is discarded when it arrives.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.state.reset();
        inner.content = None;
    }

    /// The current lifecycle phase.
    pub async fn phase(&self) -> Phase {
        self.inner.read().await.state.phase()
    }

    /// A snapshot of the transcript.
    pub async fn transcript(&self) -> Vec<Turn> {
        self.inner.read().await.state.transcript().to_vec()
    }

    /// Whether an inference call is outstanding.
    pub async fn is_pending(&self) -> bool {
        self.inner.read().await.state.pending_request()
    }

    /// The display name of the loaded document, if any.
    pub async fn loaded_document(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .content
            .as_ref()
            .map(|descriptor| descriptor.display_name.clone())
    }

    /// Takes the side-channel error signal, clearing it.
    pub async fn take_last_error(&self) -> Option<String> {
        self.inner.write().await.state.take_last_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GenerateContentRequest;
    use async_trait::async_trait;
    use docchat_core::content::ingest_text;
    use docchat_core::conversation::Role;
    use docchat_core::error::InferenceError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    // Backend that answers immediately with a fixed text.
    struct EchoBackend {
        reply: String,
        calls: AtomicUsize,
    }

    impl EchoBackend {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl InferenceBackend for EchoBackend {
        async fn generate(&self, _request: GenerateContentRequest) -> Result<Turn, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Turn::model(self.reply.clone()))
        }
    }

    // Backend that blocks until released, for in-flight scenarios.
    struct BlockingBackend {
        calls: Arc<AtomicUsize>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl InferenceBackend for BlockingBackend {
        async fn generate(&self, _request: GenerateContentRequest) -> Result<Turn, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(Turn::model("late answer"))
        }
    }

    // Backend that always fails.
    struct FailingBackend {
        error: InferenceError,
    }

    #[async_trait]
    impl InferenceBackend for FailingBackend {
        async fn generate(&self, _request: GenerateContentRequest) -> Result<Turn, InferenceError> {
            Err(self.error.clone())
        }
    }

    async fn ready_session<B: InferenceBackend>(backend: B) -> ChatSession<B> {
        let session = ChatSession::new(backend);
        session
            .load_content(ingest_text("the document body", "report.txt").unwrap())
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_start_chat_without_content_fails() {
        let session = ChatSession::new(EchoBackend::new("hi"));
        assert_eq!(session.start_chat().await.unwrap_err(), StateError::NoContent);
        assert_eq!(session.phase().await, Phase::Empty);
    }

    #[tokio::test]
    async fn test_start_chat_appends_one_greeting_with_display_name() {
        let session = ready_session(EchoBackend::new("hi")).await;
        session.start_chat().await.unwrap();

        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, Role::Model);
        assert!(transcript[0].text().contains("report.txt"));
        assert_eq!(session.phase().await, Phase::Active);
    }

    #[tokio::test]
    async fn test_start_chat_twice_is_invalid() {
        let session = ready_session(EchoBackend::new("hi")).await;
        session.start_chat().await.unwrap();
        assert!(matches!(
            session.start_chat().await,
            Err(StateError::InvalidTransition { .. })
        ));
        // No second greeting was appended.
        assert_eq!(session.transcript().await.len(), 1);
    }

    #[tokio::test]
    async fn test_load_content_during_active_is_invalid() {
        let session = ready_session(EchoBackend::new("hi")).await;
        session.start_chat().await.unwrap();

        let err = session
            .load_content(ingest_text("other", "other.txt").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { .. }));
        assert_eq!(session.loaded_document().await.as_deref(), Some("report.txt"));
    }

    #[tokio::test]
    async fn test_send_message_appends_reply_as_next_entry() {
        let session = ready_session(EchoBackend::new("Hello")).await;
        session.start_chat().await.unwrap();

        let outcome = session.send_message("What is this?").await.unwrap();
        assert_eq!(outcome, SendOutcome::Answered);

        let transcript = session.transcript().await;
        // greeting, user question, model answer
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].role, Role::User);
        assert_eq!(transcript[2].role, Role::Model);
        assert_eq!(transcript[2].text(), "Hello");
        assert!(!session.is_pending().await);
    }

    #[tokio::test]
    async fn test_send_message_rejects_blank_input() {
        let session = ready_session(EchoBackend::new("hi")).await;
        session.start_chat().await.unwrap();

        assert_eq!(
            session.send_message("   \n").await.unwrap(),
            SendOutcome::EmptyInput
        );
        assert_eq!(session.transcript().await.len(), 1);
    }

    #[tokio::test]
    async fn test_send_message_before_start_is_invalid() {
        let session = ready_session(EchoBackend::new("hi")).await;
        assert!(matches!(
            session.send_message("hello").await,
            Err(StateError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_flight_rejects_second_send() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let session = ready_session(BlockingBackend {
            calls: calls.clone(),
            release: release.clone(),
        })
        .await;
        session.start_chat().await.unwrap();

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.send_message("first").await })
        };

        // Wait for the first call to mark the request pending.
        while !session.is_pending().await {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            session.send_message("second").await.unwrap(),
            SendOutcome::Busy
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), SendOutcome::Answered);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_mid_flight_discards_stale_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let session = ready_session(BlockingBackend {
            calls: calls.clone(),
            release: release.clone(),
        })
        .await;
        session.start_chat().await.unwrap();

        let inflight = {
            let session = session.clone();
            tokio::spawn(async move { session.send_message("question").await })
        };

        while !session.is_pending().await {
            tokio::task::yield_now().await;
        }

        session.reset().await;
        assert_eq!(session.phase().await, Phase::Empty);
        assert!(session.transcript().await.is_empty());

        release.notify_one();
        assert_eq!(inflight.await.unwrap().unwrap(), SendOutcome::Stale);

        // The late answer must not leak into the reset session.
        assert!(session.transcript().await.is_empty());
        assert!(!session.is_pending().await);
    }

    #[tokio::test]
    async fn test_inference_failure_becomes_in_band_turn() {
        let session = ready_session(FailingBackend {
            error: InferenceError::transport("INVALID_ARGUMENT: API key not valid"),
        })
        .await;
        session.start_chat().await.unwrap();

        let outcome = session.send_message("hello?").await.unwrap();
        assert_eq!(outcome, SendOutcome::Answered);

        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2].role, Role::Model);
        assert!(transcript[2].text().starts_with("Sorry, something went wrong."));

        // Side-channel signal is set once and cleared on take.
        let banner = session.take_last_error().await.unwrap();
        assert!(banner.contains("API key not valid"));
        assert_eq!(session.take_last_error().await, None);

        // Phase unchanged, pending cleared: the failure is local to one op.
        assert_eq!(session.phase().await, Phase::Active);
        assert!(!session.is_pending().await);
    }

    #[tokio::test]
    async fn test_missing_credential_is_surfaced_in_band() {
        let session = ready_session(FailingBackend {
            error: InferenceError::MissingCredential,
        })
        .await;
        session.start_chat().await.unwrap();

        session.send_message("hi").await.unwrap();
        let transcript = session.transcript().await;
        assert!(transcript[2].text().contains("No API key is configured"));
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let session = ready_session(EchoBackend::new("hi")).await;
        session.reset().await;
        session.reset().await;
        assert_eq!(session.phase().await, Phase::Empty);
        assert_eq!(session.loaded_document().await, None);
    }

    #[tokio::test]
    async fn test_reload_replaces_descriptor_wholesale() {
        let session = ready_session(EchoBackend::new("hi")).await;
        session
            .load_content(ingest_text("newer content", "v2.txt").unwrap())
            .await
            .unwrap();

        assert_eq!(session.loaded_document().await.as_deref(), Some("v2.txt"));
        assert_eq!(session.phase().await, Phase::Ready);
    }
}
