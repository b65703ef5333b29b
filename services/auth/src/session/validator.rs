//! Per-request check of the session cookie and the echoed CSRF token

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    activity::ActivityRecorder,
    error::{AuthError, AuthResult},
    store::SessionStore,
    token::constant_time_eq,
};

/// Checks the session cookie and CSRF header on protected requests
#[derive(Clone)]
pub struct SessionValidator {
    store: Arc<dyn SessionStore>,
    activity: ActivityRecorder,
}

impl SessionValidator {
    pub fn new(store: Arc<dyn SessionStore>, activity: ActivityRecorder) -> Self {
        Self { store, activity }
    }

    /// Resolve the user behind a request's credentials and schedule a
    /// last-activity update for them.
    pub async fn validate(
        &self,
        session_token: Option<&str>,
        csrf_token: Option<&str>,
    ) -> AuthResult<Uuid> {
        let user_id = self.validate_at(session_token, csrf_token, Utc::now()).await?;
        self.activity.record(user_id);
        Ok(user_id)
    }

    /// Same checks as [`validate`](Self::validate) against a fixed clock,
    /// without touching last activity.
    ///
    /// Checks run in order and the first failure wins: session presence,
    /// session lookup, session expiry, CSRF presence, CSRF lookup, CSRF expiry,
    /// CSRF match.
    pub async fn validate_at(
        &self,
        session_token: Option<&str>,
        csrf_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuthResult<Uuid> {
        let session_token = session_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidSession)?;

        let Some(session) = self.store.get_session_by_token(session_token).await? else {
            debug!("Unknown session token presented");
            return Err(AuthError::InvalidSession);
        };
        if session.is_expired_at(now) {
            debug!(session_id = %session.id, "Expired session presented");
            return Err(AuthError::SessionExpired);
        }

        let submitted = csrf_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCsrf)?;

        let Some(csrf) = self.store.get_csrf_by_session_id(session.id).await? else {
            warn!(session_id = %session.id, "Session has no CSRF token");
            return Err(AuthError::InvalidSession);
        };
        if csrf.is_expired_at(now) {
            return Err(AuthError::SessionExpired);
        }
        if !constant_time_eq(csrf.token.as_bytes(), submitted.as_bytes()) {
            warn!(session_id = %session.id, "CSRF token mismatch");
            return Err(AuthError::InvalidCsrf);
        }

        Ok(session.user_id)
    }
}
