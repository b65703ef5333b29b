use std::sync::Arc;

use crate::{
    activity::ActivityRecorder,
    config::AuthConfig,
    cookies::CookiePolicy,
    password::CredentialVerifier,
    session::{SessionIssuer, SessionRevoker, SessionValidator},
    store::SessionStore,
    token::TokenGenerator,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub issuer: SessionIssuer,
    pub validator: SessionValidator,
    pub revoker: SessionRevoker,
    pub cookies: CookiePolicy,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn CredentialVerifier>,
        tokens: Arc<dyn TokenGenerator>,
        activity: ActivityRecorder,
        config: &AuthConfig,
    ) -> Self {
        let issuer = SessionIssuer::new(
            Arc::clone(&store),
            Arc::clone(&verifier),
            tokens,
            activity.clone(),
            config.session_ttl(),
        );
        let validator = SessionValidator::new(Arc::clone(&store), activity);
        let revoker = SessionRevoker::new(Arc::clone(&store));

        Self {
            store,
            verifier,
            issuer,
            validator,
            revoker,
            cookies: CookiePolicy::new(config.cookie_secure),
        }
    }
}
