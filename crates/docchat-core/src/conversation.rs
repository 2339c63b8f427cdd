//! Conversation transcript and session phase state machine.
//!
//! A conversation is an ordered, append-only sequence of [`Turn`]s plus an
//! explicit [`Phase`]. The transcript is only ever cleared by a full reset.

use crate::error::StateError;
use serde::{Deserialize, Serialize};

/// Attribution of a turn in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// A turn authored by the user.
    User,
    /// A turn authored by the model (or synthesized locally on its behalf).
    Model,
}

/// One content fragment of a turn.
///
/// The current contract always populates exactly one `Text` fragment per
/// turn; the enum leaves room for future multi-part turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPart {
    /// A plain text fragment.
    Text(String),
}

/// One exchange unit in the transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored this turn.
    pub role: Role,
    /// Ordered content fragments.
    pub parts: Vec<TurnPart>,
}

impl Turn {
    /// Creates a user turn with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![TurnPart::Text(text.into())],
        }
    }

    /// Creates a model turn with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![TurnPart::Text(text.into())],
        }
    }

    /// Concatenates all text parts of this turn.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                TurnPart::Text(text) => text.as_str(),
            })
            .collect()
    }
}

/// Lifecycle phase of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No document content loaded.
    Empty,
    /// Content loaded, chat not started.
    Ready,
    /// Chat started, transcript non-empty.
    Active,
}

/// The complete mutable state of one chat session.
///
/// Owned exclusively by the session controller; collaborators receive
/// read-only snapshots. `send_message` is a self-transition on `Active`
/// and does not go through [`ConversationState::set_phase`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    transcript: Vec<Turn>,
    phase: Phase,
    pending_request: bool,
    generation: u64,
    last_error: Option<String>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            transcript: Vec::new(),
            phase: Phase::Empty,
            pending_request: false,
            generation: 0,
            last_error: None,
        }
    }
}

impl ConversationState {
    /// Creates a fresh session state in the `Empty` phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// The ordered transcript. Insertion order defines the conversational
    /// context sent to the backend.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a remote inference call is outstanding (single-flight guard).
    pub fn pending_request(&self) -> bool {
        self.pending_request
    }

    /// The reset generation. Bumped on every [`ConversationState::reset`];
    /// responses tagged with an older generation must be discarded.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Appends a turn to the transcript. No validation beyond shape.
    pub fn append_turn(&mut self, turn: Turn) {
        self.transcript.push(turn);
    }

    /// Transitions to `next` if the state machine defines the edge.
    ///
    /// Defined edges: `Empty -> Ready`, `Ready -> Ready` (re-upload),
    /// `Ready -> Active`, and `* -> Empty` (reset, idempotent). There is
    /// no way back from `Active` except a full reset.
    pub fn set_phase(&mut self, next: Phase) -> Result<(), StateError> {
        let allowed = matches!(
            (self.phase, next),
            (Phase::Empty, Phase::Ready)
                | (Phase::Ready, Phase::Ready)
                | (Phase::Ready, Phase::Active)
                | (_, Phase::Empty)
        );

        if !allowed {
            return Err(StateError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }

        self.phase = next;
        Ok(())
    }

    /// Marks a remote call as outstanding (or completed).
    pub fn set_pending(&mut self, pending: bool) {
        self.pending_request = pending;
    }

    /// Records the side-channel error signal for UI banner display.
    pub fn set_last_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Takes the last error signal, clearing it.
    pub fn take_last_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Full reset: clears the transcript and error signal, returns to
    /// `Empty`, drops the pending flag, and bumps the generation so any
    /// in-flight response is discarded on arrival.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.phase = Phase::Empty;
        self.pending_request = false;
        self.last_error = None;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_empty() {
        let state = ConversationState::new();
        assert_eq!(state.phase(), Phase::Empty);
        assert!(state.transcript().is_empty());
        assert!(!state.pending_request());
    }

    #[test]
    fn test_defined_transitions() {
        let mut state = ConversationState::new();
        state.set_phase(Phase::Ready).unwrap();
        state.set_phase(Phase::Ready).unwrap();
        state.set_phase(Phase::Active).unwrap();
        state.set_phase(Phase::Empty).unwrap();
        // Reset is idempotent
        state.set_phase(Phase::Empty).unwrap();
    }

    #[test]
    fn test_undefined_transitions_are_rejected() {
        let mut state = ConversationState::new();

        // Empty -> Active skips Ready
        let err = state.set_phase(Phase::Active).unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidTransition {
                from: Phase::Empty,
                to: Phase::Active,
            }
        );

        // Active -> Ready is not defined; only reset leaves Active
        state.set_phase(Phase::Ready).unwrap();
        state.set_phase(Phase::Active).unwrap();
        assert!(state.set_phase(Phase::Ready).is_err());
        assert_eq!(state.phase(), Phase::Active);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut state = ConversationState::new();
        state.append_turn(Turn::user("first"));
        state.append_turn(Turn::model("second"));

        assert_eq!(state.transcript().len(), 2);
        assert_eq!(state.transcript()[0].text(), "first");
        assert_eq!(state.transcript()[1].role, Role::Model);
    }

    #[test]
    fn test_reset_clears_everything_and_bumps_generation() {
        let mut state = ConversationState::new();
        state.set_phase(Phase::Ready).unwrap();
        state.set_phase(Phase::Active).unwrap();
        state.append_turn(Turn::user("hello"));
        state.set_pending(true);
        state.set_last_error("boom");
        let generation = state.generation();

        state.reset();

        assert_eq!(state.phase(), Phase::Empty);
        assert!(state.transcript().is_empty());
        assert!(!state.pending_request());
        assert_eq!(state.take_last_error(), None);
        assert_eq!(state.generation(), generation + 1);
    }

    #[test]
    fn test_turn_text_concatenates_parts() {
        let turn = Turn {
            role: Role::Model,
            parts: vec![
                TurnPart::Text("Hello, ".to_string()),
                TurnPart::Text("world".to_string()),
            ],
        };
        assert_eq!(turn.text(), "Hello, world");
    }
}
