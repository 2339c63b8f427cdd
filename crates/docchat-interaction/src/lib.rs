//! Remote inference and session orchestration for DocChat.
//!
//! This crate holds the pieces of a document-chat session that talk to, or
//! shape requests for, the generative backend:
//!
//! - `gemini`: the Gemini REST wire types and the [`GeminiClient`]
//! - `prompt`: the deterministic prompt assembler
//! - `session`: the [`ChatSession`] controller driving the state machine
//! - `config`: secret/API-key loading
//!
//! Domain types (transcript, phases, content descriptors, errors) live in
//! `docchat-core`.

pub mod config;
pub mod gemini;
pub mod prompt;
pub mod session;

pub use config::SecretConfig;
pub use gemini::{GeminiClient, GeminiConfig, InferenceBackend};
pub use session::{ChatSession, SendOutcome};
