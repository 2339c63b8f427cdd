//! Secret configuration for the inference backend.
//!
//! `~/.config/docchat/secret.json` supplies the API key plus optional model
//! and request-timeout overrides:
//!
//! ```json
//! {
//!   "gemini": {
//!     "api_key": "...",
//!     "model_name": "gemini-2.5-flash",
//!     "request_timeout_secs": 30
//!   }
//! }
//! ```

use crate::gemini::GeminiConfig;
use docchat_core::error::InferenceError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parsed contents of the secret file.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    gemini: Option<GeminiSecret>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiSecret {
    api_key: String,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

impl SecretConfig {
    /// Loads the secret file from `~/.config/docchat/secret.json`.
    pub fn load() -> Result<Self, InferenceError> {
        Self::load_from(default_path()?)
    }

    /// Loads and parses a secret file at `path`.
    ///
    /// # Errors
    ///
    /// [`InferenceError::MissingCredential`] when the file is absent or
    /// unreadable; [`InferenceError::Unexpected`] when it does not parse.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|err| {
            tracing::debug!(path = %path.display(), %err, "secret file not readable");
            InferenceError::MissingCredential
        })?;

        serde_json::from_str(&content).map_err(|err| {
            InferenceError::unexpected(format!("malformed secret file {}: {err}", path.display()))
        })
    }

    /// Converts the file contents into a client configuration, applying the
    /// model and timeout overrides when present.
    ///
    /// # Errors
    ///
    /// [`InferenceError::MissingCredential`] when the file carries no
    /// `gemini` section.
    pub fn into_gemini_config(self) -> Result<GeminiConfig, InferenceError> {
        let secret = self.gemini.ok_or(InferenceError::MissingCredential)?;

        let mut config = GeminiConfig::new(secret.api_key);
        if let Some(model) = secret.model_name {
            config = config.with_model(model);
        }
        if let Some(secs) = secret.request_timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn default_path() -> Result<PathBuf, InferenceError> {
    let home = dirs::home_dir().ok_or(InferenceError::MissingCredential)?;
    Ok(home.join(".config").join("docchat").join("secret.json"))
}
