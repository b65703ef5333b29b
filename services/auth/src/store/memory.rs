//! In-process session store
//!
//! Enforces the same rules the PostgreSQL schema does: unique emails,
//! usernames and token values, CSRF rows that must reference an existing
//! session (at most one each), and cascade removal of the CSRF row when its
//! session is deleted. Used for tests and for running the service without a
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{SessionStore, StoreError, StoreResult};
use crate::models::{CsrfToken, NewUser, SessionToken, User};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, SessionToken>,
    csrf_tokens: HashMap<Uuid, CsrfToken>,
}

/// Session store kept in memory behind an async mutex
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live session rows
    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    /// Number of live CSRF rows
    pub async fn csrf_count(&self) -> usize {
        self.tables.lock().await.csrf_tokens.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;

        if tables.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
        if tables.users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            username: new_user.username.clone(),
            password_hash: new_user.password_hash.clone(),
            created_at: now,
            updated_at: now,
            last_activity: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_last_activity(&self, user_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.last_activity = Utc::now();
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SessionToken> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::ForeignKey(
                "session_tokens_user_id_fkey".to_string(),
            ));
        }
        if tables.sessions.values().any(|s| s.token == token) {
            return Err(StoreError::Conflict("session_tokens_token_key".to_string()));
        }

        let session = SessionToken {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<SessionToken>> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.values().find(|s| s.token == token).cloned())
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;

        let Some(id) = tables
            .sessions
            .values()
            .find(|s| s.token == token)
            .map(|s| s.id)
        else {
            return Ok(false);
        };

        tables.sessions.remove(&id);
        tables.csrf_tokens.retain(|_, csrf| csrf.session_id != id);
        Ok(true)
    }

    async fn create_csrf(
        &self,
        session_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<CsrfToken> {
        let mut tables = self.tables.lock().await;

        if !tables.sessions.contains_key(&session_id) {
            return Err(StoreError::ForeignKey(
                "csrf_tokens_session_id_fkey".to_string(),
            ));
        }
        if tables
            .csrf_tokens
            .values()
            .any(|c| c.session_id == session_id)
        {
            return Err(StoreError::Conflict("csrf_tokens_session_id_key".to_string()));
        }
        if tables.csrf_tokens.values().any(|c| c.token == token) {
            return Err(StoreError::Conflict("csrf_tokens_token_key".to_string()));
        }

        let csrf = CsrfToken {
            id: Uuid::new_v4(),
            session_id,
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        tables.csrf_tokens.insert(csrf.id, csrf.clone());
        Ok(csrf)
    }

    async fn get_csrf_by_session_id(&self, session_id: Uuid) -> StoreResult<Option<CsrfToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .csrf_tokens
            .values()
            .find(|c| c.session_id == session_id)
            .cloned())
    }
}
