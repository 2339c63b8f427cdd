//! HTTP routes.
//!
//! # Endpoints
//!
//! | Method | Path    | Description                          |
//! |--------|---------|--------------------------------------|
//! | `GET`  | `/`     | Welcome / liveness check             |
//! | `POST` | `/user` | Find-or-create a user by provider uid |
//!
//! # Error contract
//!
//! ```json
//! { "message": "firebaseUid and email are required fields." }
//! ```
//!
//! 400 when `firebaseUid` or `email` is missing, 500 on storage failure.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the browser client is
//! served from a different origin.

use crate::repository::UserRepository;
use crate::user::UserRecord;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(welcome))
        .route("/user", post(find_or_create_user))
        .layer(cors)
        .with_state(state)
}

async fn welcome() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the server!" }))
}

/// Incoming profile tuple from the identity provider.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertUserRequest {
    #[serde(default)]
    firebase_uid: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    photo_url: Option<String>,
}

/// Finds the user by provider uid, creating the record on first sight.
/// Repeated calls with the same uid return the existing record.
async fn find_or_create_user(
    State(state): State<AppState>,
    Json(payload): Json<UpsertUserRequest>,
) -> Response {
    let (firebase_uid, email) = match (
        payload.firebase_uid.filter(|uid| !uid.trim().is_empty()),
        payload.email.filter(|email| !email.trim().is_empty()),
    ) {
        (Some(uid), Some(email)) => (uid, email),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "firebaseUid and email are required fields." })),
            )
                .into_response();
        }
    };

    let existing = match state.users.find_by_firebase_uid(&firebase_uid).await {
        Ok(existing) => existing,
        Err(err) => return storage_failure(err),
    };

    if let Some(user) = existing {
        return (StatusCode::OK, Json(user)).into_response();
    }

    let user = UserRecord::new(&firebase_uid, &email, payload.display_name, payload.photo_url);
    if let Err(err) = state.users.save(&user).await {
        return storage_failure(err);
    }

    tracing::info!(uid = %firebase_uid, "created user");
    (StatusCode::OK, Json(user)).into_response()
}

fn storage_failure(err: crate::repository::StoreError) -> Response {
    tracing::error!(%err, "user storage failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Server error while processing user data." })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StoreError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower::ServiceExt;

    // In-memory repository for handler tests.
    #[derive(Default)]
    struct MemoryUserRepository {
        users: Mutex<HashMap<String, UserRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl UserRepository for MemoryUserRepository {
        async fn find_by_firebase_uid(
            &self,
            uid: &str,
        ) -> Result<Option<UserRecord>, StoreError> {
            if self.fail {
                return Err(StoreError::Io(std::io::Error::other("disk on fire")));
            }
            Ok(self.users.lock().unwrap().get(uid).cloned())
        }

        async fn save(&self, user: &UserRecord) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Io(std::io::Error::other("disk on fire")));
            }
            self.users
                .lock()
                .unwrap()
                .insert(user.firebase_uid.clone(), user.clone());
            Ok(())
        }

        async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError> {
            Ok(self.users.lock().unwrap().values().cloned().collect())
        }
    }

    fn test_router(fail: bool) -> Router {
        router(AppState {
            users: Arc::new(MemoryUserRepository {
                fail,
                ..Default::default()
            }),
        })
    }

    async fn post_user(router: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/user")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_fields_is_bad_request() {
        let (status, body) = post_user(test_router(false), json!({ "email": "a@b.c" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "firebaseUid and email are required fields."
        );

        let (status, _) = post_user(test_router(false), json!({ "firebaseUid": "u1" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let router = test_router(false);

        let payload = json!({
            "firebaseUid": "uid-1",
            "email": "Jo@Example.com",
            "displayName": "Jo",
            "photoURL": "https://example.com/jo.png"
        });

        let (status, first) = post_user(router.clone(), payload.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["firebaseUid"], "uid-1");
        assert_eq!(first["email"], "jo@example.com");
        assert_eq!(first["roles"], json!(["user"]));

        let (status, second) = post_user(router, payload).await;
        assert_eq!(status, StatusCode::OK);
        // Same stored record, not a duplicate.
        assert_eq!(second["id"], first["id"]);
        assert_eq!(second["createdAt"], first["createdAt"]);
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let (status, body) = post_user(
            test_router(true),
            json!({ "firebaseUid": "u1", "email": "a@b.c" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server error while processing user data.");
    }

    #[tokio::test]
    async fn test_welcome_route() {
        let response = test_router(false)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
