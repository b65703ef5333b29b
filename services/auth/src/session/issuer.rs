//! Login: credential check and session/CSRF issuance

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

use crate::{
    activity::ActivityRecorder,
    error::{AuthError, AuthResult},
    models::User,
    password::CredentialVerifier,
    store::SessionStore,
    token::{TOKEN_BYTES, TokenGenerator},
};

/// Password checked against a throwaway hash when the email is unknown
const DECOY_PASSWORD: &str = "decoy-password-never-issued";

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub session_token: String,
    pub csrf_token: String,
    /// Shared by both tokens
    pub expires_at: DateTime<Utc>,
}

/// Verifies credentials and mints session/CSRF pairs
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn CredentialVerifier>,
    tokens: Arc<dyn TokenGenerator>,
    activity: ActivityRecorder,
    session_ttl: Duration,
    decoy_hash: Arc<OnceLock<String>>,
}

impl SessionIssuer {
    pub fn new(
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn CredentialVerifier>,
        tokens: Arc<dyn TokenGenerator>,
        activity: ActivityRecorder,
        session_ttl: Duration,
    ) -> Self {
        Self {
            store,
            verifier,
            tokens,
            activity,
            session_ttl,
            decoy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Authenticate `email`/`password` and persist a new session with its
    /// CSRF token.
    ///
    /// Unknown emails and wrong passwords both fail with
    /// [`AuthError::InvalidCredentials`], and both pay for one password
    /// verification.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<IssuedSession> {
        let Some(user) = self.store.get_user_by_email(email).await? else {
            self.verify_decoy(password).await;
            warn!("Login rejected: no account for the submitted email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let session_token = self.tokens.generate(TOKEN_BYTES)?;
        let csrf_token = self.tokens.generate(TOKEN_BYTES)?;
        let expires_at = Utc::now() + self.session_ttl;

        let session = self
            .store
            .create_session(user.id, &session_token, expires_at)
            .await?;

        // The two inserts are separate statements; undo the first if the
        // second fails so no session is left without its CSRF pairing.
        if let Err(e) = self
            .store
            .create_csrf(session.id, &csrf_token, expires_at)
            .await
        {
            if let Err(cleanup) = self.store.delete_session(&session_token).await {
                error!(
                    session_id = %session.id,
                    "Failed to discard session after CSRF insert failure: {}", cleanup
                );
            }
            return Err(e.into());
        }

        self.activity.record(user.id);
        info!(user_id = %user.id, session_id = %session.id, "Session issued");

        Ok(IssuedSession {
            user,
            session_token,
            csrf_token,
            expires_at,
        })
    }

    async fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let verifier = Arc::clone(&self.verifier);
        let password = password.to_owned();
        let hash = hash.to_owned();

        let matches = tokio::task::spawn_blocking(move || verifier.verify(&password, &hash))
            .await
            .context("password verification task failed")??;
        Ok(matches)
    }

    /// Run one verification whose outcome is discarded
    async fn verify_decoy(&self, password: &str) {
        let verifier = Arc::clone(&self.verifier);
        let decoy_hash = Arc::clone(&self.decoy_hash);
        let password = password.to_owned();

        let outcome = tokio::task::spawn_blocking(move || {
            let hash = decoy_hash.get_or_init(|| {
                verifier.hash(DECOY_PASSWORD).unwrap_or_else(|e| {
                    error!("Failed to hash decoy password: {:#}", e);
                    String::new()
                })
            });
            verifier.verify(&password, hash)
        })
        .await;

        if let Err(e) = outcome {
            error!("Decoy verification task failed: {}", e);
        }
    }
}
