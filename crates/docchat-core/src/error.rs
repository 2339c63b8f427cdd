//! Error types for the DocChat session core.

use crate::conversation::Phase;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while turning a user-supplied file into a content
/// descriptor.
///
/// Ingestion errors are surfaced synchronously to the caller and never
/// mutate session state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestError {
    /// No file was provided, or the provided payload was empty.
    #[error("No file content was provided")]
    NoFile,

    /// The declared media type is not in the configured allow-list.
    #[error("Unsupported media type: {0}")]
    UnsupportedType(String),

    /// Reading the file failed (I/O error, malformed transfer envelope).
    #[error("Failed to read the file: {0}")]
    ReadFailure(String),
}

/// Errors produced by the session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateError {
    /// A phase transition that the state machine does not define.
    #[error("Invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: Phase, to: Phase },

    /// Chat was started (or a message sent) with no document loaded.
    #[error("No document content has been loaded")]
    NoContent,
}

/// Errors produced by the remote inference client.
///
/// These are never thrown past the session controller: the controller
/// converts them into an in-band model turn so the transcript always
/// reflects what the user saw.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceError {
    /// The backend answered with a non-success status (or timed out).
    /// The message is taken from the structured error body when present.
    #[error("Backend error: {0}")]
    Transport(String),

    /// The backend answered successfully but produced no usable content,
    /// e.g. after safety filtering. Carries the finish reason when the
    /// backend reported one, `"unknown"` otherwise.
    #[error("The model returned no content (finish reason: {0})")]
    EmptyResponse(String),

    /// The call itself failed: network unreachable, malformed response
    /// body, or any other unexpected condition.
    #[error("Unexpected failure: {0}")]
    Unexpected(String),

    /// No usable API key is configured. Detected before any network call.
    #[error("No API key is configured for the inference backend")]
    MissingCredential,
}

impl InferenceError {
    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an Unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Check if this is a MissingCredential error
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Self::MissingCredential)
    }

    /// Check if this is an EmptyResponse error
    pub fn is_empty_response(&self) -> bool {
        matches!(self, Self::EmptyResponse(_))
    }
}
