//! User persistence.
//!
//! One JSON document per user under a data directory, written atomically
//! via a temporary file and rename. An in-memory implementation backs the
//! route tests.

use crate::user::UserRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from the storage layer. Mapped to HTTP 500 by the routes.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Repository interface for stored users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Looks a user up by the identity provider's uid.
    async fn find_by_firebase_uid(&self, uid: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Persists a user record (insert or overwrite).
    async fn save(&self, user: &UserRecord) -> Result<(), StoreError>;

    /// Lists all stored users.
    async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError>;
}

/// Directory-backed user repository.
///
/// Directory structure:
/// ```text
/// base_dir/
/// └── users/
///     ├── <uid>.json
///     └── <uid>.json
/// ```
pub struct DirUserRepository {
    users_dir: PathBuf,
}

impl DirUserRepository {
    /// Creates the repository, ensuring the users directory exists.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let users_dir = base_dir.as_ref().join("users");
        fs::create_dir_all(&users_dir).await?;
        Ok(Self { users_dir })
    }

    fn path_for(&self, uid: &str) -> PathBuf {
        self.users_dir.join(format!("{}.json", encode_filename(uid)))
    }
}

/// Keeps uid-derived filenames safe: alphanumerics, `-` and `_` pass
/// through, everything else is percent-style escaped.
fn encode_filename(uid: &str) -> String {
    uid.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_string()
            } else {
                format!("%{:02X}", c as u32)
            }
        })
        .collect()
}

#[async_trait]
impl UserRepository for DirUserRepository {
    async fn find_by_firebase_uid(&self, uid: &str) -> Result<Option<UserRecord>, StoreError> {
        let path = self.path_for(uid);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, user: &UserRecord) -> Result<(), StoreError> {
        let path = self.path_for(&user.firebase_uid);
        let content = serde_json::to_string_pretty(user)?;

        // Temp file + rename keeps readers from seeing partial writes.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &path).await?;

        tracing::debug!(uid = %user.firebase_uid, "saved user record");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let mut users = Vec::new();
        let mut entries = fs::read_dir(&self.users_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            users.push(serde_json::from_str(&content)?);
        }

        Ok(users)
    }
}
