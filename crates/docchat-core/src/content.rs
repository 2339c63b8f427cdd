//! Document content ingestion.
//!
//! Converts a raw user-supplied file (bytes, a file on disk, a `data:` URL,
//! or pasted text) into a validated [`ContentDescriptor`]. A descriptor only
//! exists after successful validation; no partial descriptor is ever
//! produced. Ingestion has no side effects beyond the returned value.

use crate::error::IngestError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Media types accepted by the default policy.
pub const DEFAULT_ALLOWED_MEDIA_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "application/pdf",
];

/// Configured allow-list of document media types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTypePolicy {
    /// Exact media types accepted.
    allowed: Vec<String>,
    /// Accepted media-type prefixes, e.g. `image/`.
    prefixes: Vec<String>,
}

impl Default for MediaTypePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_MEDIA_TYPES.iter().copied())
    }
}

impl MediaTypePolicy {
    /// Creates a policy from an exact allow-list.
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            prefixes: Vec::new(),
        }
    }

    /// The image-only variant: accepts any `image/*` media type.
    pub fn images_only() -> Self {
        Self {
            allowed: Vec::new(),
            prefixes: vec!["image/".to_string()],
        }
    }

    /// Whether the policy accepts `media_type`.
    pub fn allows(&self, media_type: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == media_type)
            || self
                .prefixes
                .iter()
                .any(|prefix| media_type.starts_with(prefix.as_str()))
    }
}

/// The loaded document payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentBody {
    /// Binary content sent inline to the backend.
    Inline {
        /// Validated media type, e.g. `image/png`.
        media_type: String,
        /// Base64-encoded payload with no transfer-envelope prefix.
        data: String,
    },
    /// Raw extracted or pasted text, embedded verbatim in the prompt.
    Text(String),
}

/// The loaded document: payload plus display metadata.
///
/// Replaced wholesale on the next upload; cleared on session reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    /// The validated payload.
    pub body: ContentBody,
    /// Human-readable source name, e.g. the original file name.
    pub display_name: String,
}

impl ContentDescriptor {
    /// Whether this descriptor carries inline binary content.
    pub fn is_inline(&self) -> bool {
        matches!(self.body, ContentBody::Inline { .. })
    }
}

/// Ingests an in-memory file payload with a declared media type.
///
/// # Errors
///
/// - [`IngestError::NoFile`] if `bytes` is empty
/// - [`IngestError::UnsupportedType`] if the policy rejects `media_type`
pub fn ingest_bytes(
    bytes: &[u8],
    media_type: &str,
    display_name: &str,
    policy: &MediaTypePolicy,
) -> Result<ContentDescriptor, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::NoFile);
    }

    if !policy.allows(media_type) {
        return Err(IngestError::UnsupportedType(media_type.to_string()));
    }

    Ok(ContentDescriptor {
        body: ContentBody::Inline {
            media_type: media_type.to_string(),
            data: BASE64_STANDARD.encode(bytes),
        },
        display_name: display_name.to_string(),
    })
}

/// Reads and ingests a file from disk, guessing the media type from the
/// file extension.
///
/// # Errors
///
/// - [`IngestError::NoFile`] if the file does not exist
/// - [`IngestError::ReadFailure`] on any other I/O error
/// - [`IngestError::UnsupportedType`] if the policy rejects the guessed type
pub async fn ingest_file(
    path: impl AsRef<Path>,
    policy: &MediaTypePolicy,
) -> Result<ContentDescriptor, IngestError> {
    let path = path.as_ref();

    let bytes = tokio::fs::read(path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            IngestError::NoFile
        } else {
            IngestError::ReadFailure(err.to_string())
        }
    })?;

    let media_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let display_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    tracing::debug!(path = %path.display(), %media_type, "ingesting file");
    ingest_bytes(&bytes, &media_type, &display_name, policy)
}

/// Ingests a `data:<type>;base64,<payload>` URL, stripping the transfer
/// envelope so only the bare base64 payload is stored.
///
/// # Errors
///
/// - [`IngestError::ReadFailure`] if the URL is not a base64 `data:` URL
///   or the payload does not decode
/// - [`IngestError::NoFile`] if the payload is empty
/// - [`IngestError::UnsupportedType`] if the policy rejects the declared type
pub fn ingest_data_url(
    url: &str,
    display_name: &str,
    policy: &MediaTypePolicy,
) -> Result<ContentDescriptor, IngestError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| IngestError::ReadFailure("not a data: URL".to_string()))?;

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| IngestError::ReadFailure("malformed data: URL".to_string()))?;

    let media_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| IngestError::ReadFailure("data: URL is not base64-encoded".to_string()))?;

    if payload.is_empty() {
        return Err(IngestError::NoFile);
    }

    if !policy.allows(media_type) {
        return Err(IngestError::UnsupportedType(media_type.to_string()));
    }

    // Reject payloads that would not decode instead of storing them.
    BASE64_STANDARD
        .decode(payload)
        .map_err(|err| IngestError::ReadFailure(format!("invalid base64 payload: {err}")))?;

    Ok(ContentDescriptor {
        body: ContentBody::Inline {
            media_type: media_type.to_string(),
            data: payload.to_string(),
        },
        display_name: display_name.to_string(),
    })
}

/// Ingests pasted or extracted text as the grounded document.
///
/// # Errors
///
/// [`IngestError::NoFile`] if the text is empty or whitespace-only.
pub fn ingest_text(text: &str, display_name: &str) -> Result<ContentDescriptor, IngestError> {
    if text.trim().is_empty() {
        return Err(IngestError::NoFile);
    }

    Ok(ContentDescriptor {
        body: ContentBody::Text(text.to_string()),
        display_name: display_name.to_string(),
    })
}
