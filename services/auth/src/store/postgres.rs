//! PostgreSQL implementation of the session store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use std::{future::Future, time::Duration};
use tracing::{Instrument, info};
use uuid::Uuid;

use super::{SessionStore, StoreError, StoreResult};
use crate::models::{CsrfToken, NewUser, SessionToken, User};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const USER_COLUMNS: &str =
    "id, name, email, username, password_hash, created_at, updated_at, last_activity";

/// Session store backed by a PostgreSQL pool
///
/// Every query is bounded by `query_timeout`; an expired budget surfaces as
/// [`StoreError::Timeout`].
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgSessionStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    async fn bounded<T, F>(&self, operation: &'static str, query: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        let span = tracing::debug_span!("db.query", db.system = "postgresql", db.operation = operation);
        match tokio::time::timeout(self.query_timeout, query.instrument(span)).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(StoreError::Timeout {
                operation,
                timeout: self.query_timeout,
            }),
        }
    }

    async fn fetch_user(&self, operation: &'static str, column: &str, value: &str) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        self.bounded(
            operation,
            sqlx::query_as::<_, User>(&query)
                .bind(value)
                .fetch_optional(&self.pool),
        )
        .await
    }
}

/// Map driver errors onto store errors, keeping constraint names for logs.
fn classify(err: sqlx::Error) -> StoreError {
    let constraint = err
        .as_database_error()
        .and_then(|db_err| db_err.constraint())
        .unwrap_or("unknown")
        .to_string();

    let err = DatabaseError::Query(err);
    match err.sql_state().as_deref() {
        Some(UNIQUE_VIOLATION) => StoreError::Conflict(constraint),
        Some(FOREIGN_KEY_VIOLATION) => StoreError::ForeignKey(constraint),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.fetch_user("get_user_by_email", "email", email).await
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.fetch_user("get_user_by_username", "username", username)
            .await
    }

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.bounded(
            "get_user_by_id",
            sqlx::query_as::<_, User>(&query)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.username);

        let query = format!(
            r#"
            INSERT INTO users (name, email, username, password_hash, created_at, updated_at, last_activity)
            VALUES ($1, $2, $3, $4, NOW(), NOW(), NOW())
            RETURNING {USER_COLUMNS}
            "#
        );
        self.bounded(
            "create_user",
            sqlx::query_as::<_, User>(&query)
                .bind(&new_user.name)
                .bind(&new_user.email)
                .bind(&new_user.username)
                .bind(&new_user.password_hash)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn update_last_activity(&self, user_id: Uuid) -> StoreResult<()> {
        let result = self
            .bounded(
                "update_last_activity",
                sqlx::query("UPDATE users SET last_activity = CURRENT_TIMESTAMP WHERE id = $1")
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SessionToken> {
        self.bounded(
            "create_session",
            sqlx::query_as::<_, SessionToken>(
                r#"
                INSERT INTO session_tokens (user_id, token, expires_at)
                VALUES ($1, $2, $3)
                RETURNING id, user_id, token, expires_at, created_at
                "#,
            )
            .bind(user_id)
            .bind(token)
            .bind(expires_at)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<SessionToken>> {
        self.bounded(
            "get_session_by_token",
            sqlx::query_as::<_, SessionToken>(
                r#"
                SELECT id, user_id, token, expires_at, created_at
                FROM session_tokens
                WHERE token = $1
                "#,
            )
            .bind(token)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let result = self
            .bounded(
                "delete_session",
                sqlx::query("DELETE FROM session_tokens WHERE token = $1")
                    .bind(token)
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_csrf(
        &self,
        session_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<CsrfToken> {
        self.bounded(
            "create_csrf",
            sqlx::query_as::<_, CsrfToken>(
                r#"
                INSERT INTO csrf_tokens (session_id, token, expires_at)
                VALUES ($1, $2, $3)
                RETURNING id, session_id, token, expires_at, created_at
                "#,
            )
            .bind(session_id)
            .bind(token)
            .bind(expires_at)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn get_csrf_by_session_id(&self, session_id: Uuid) -> StoreResult<Option<CsrfToken>> {
        self.bounded(
            "get_csrf_by_session_id",
            sqlx::query_as::<_, CsrfToken>(
                r#"
                SELECT id, session_id, token, expires_at, created_at
                FROM csrf_tokens
                WHERE session_id = $1
                "#,
            )
            .bind(session_id)
            .fetch_optional(&self.pool),
        )
        .await
    }
}
