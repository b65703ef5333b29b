//! Persistence for users, sessions and CSRF tokens
//!
//! The store is the only shared mutable resource of the service. It owns
//! uniqueness of token values, the one-to-one link between a CSRF token and
//! its session, and the cascade that removes the CSRF token when the session
//! row is deleted. Callers never re-check those rules.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CsrfToken, NewUser, SessionToken, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgSessionStore;

/// Errors raised by a [`SessionStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A unique constraint rejected the write
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// The write referenced a parent row that does not exist
    #[error("foreign key violated: {0}")]
    ForeignKey(String),

    #[error("store operation `{operation}` timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operations consumed by the session core and the HTTP handlers
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn create_user(&self, new_user: &NewUser) -> StoreResult<User>;

    /// Set the user's last activity to the current time.
    async fn update_last_activity(&self, user_id: Uuid) -> StoreResult<()>;

    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SessionToken>;

    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<SessionToken>>;

    /// Delete a session by its token value. Returns `false` when no row
    /// matched. The paired CSRF token goes with it.
    async fn delete_session(&self, token: &str) -> StoreResult<bool>;

    async fn create_csrf(
        &self,
        session_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<CsrfToken>;

    async fn get_csrf_by_session_id(&self, session_id: Uuid) -> StoreResult<Option<CsrfToken>>;
}
