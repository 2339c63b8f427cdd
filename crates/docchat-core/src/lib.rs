//! Core domain types for DocChat document-grounded chat sessions.
//!
//! This crate contains everything a UI or transport layer needs to model a
//! chat-with-your-document session, with no network I/O:
//!
//! - `content`: media-type validation and file ingestion into a
//!   [`ContentDescriptor`]
//! - `conversation`: the append-only transcript and the session phase
//!   state machine
//! - `error`: the shared error taxonomy
//!
//! The remote inference client and the session controller that drive these
//! types live in `docchat-interaction`.

pub mod content;
pub mod conversation;
pub mod error;

// Re-export the common types
pub use content::{ContentBody, ContentDescriptor, MediaTypePolicy};
pub use conversation::{ConversationState, Phase, Role, Turn, TurnPart};
pub use error::{IngestError, InferenceError, StateError};
