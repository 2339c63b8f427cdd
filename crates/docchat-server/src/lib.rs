//! Find-or-create user service.
//!
//! A minimal HTTP backend for the DocChat marketing site: the client signs
//! the user in with an external identity provider and forwards the
//! resulting profile tuple here, where it is stored once and returned on
//! every subsequent call (idempotent on the provider's uid).

pub mod repository;
pub mod routes;
pub mod user;

pub use repository::{DirUserRepository, StoreError, UserRepository};
pub use routes::{AppState, router};
pub use user::UserRecord;
