//! Logout

use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::{AuthError, AuthResult},
    store::SessionStore,
};

/// Ends sessions on logout
#[derive(Clone)]
pub struct SessionRevoker {
    store: Arc<dyn SessionStore>,
}

impl SessionRevoker {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Delete the session identified by `session_token` together with its
    /// CSRF token.
    ///
    /// Revoking a session that no longer exists succeeds. No CSRF check is
    /// made here.
    pub async fn logout(&self, session_token: Option<&str>) -> AuthResult<()> {
        let token = session_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidSession)?;

        if self.store.delete_session(token).await? {
            info!("Session revoked");
        } else {
            debug!("Logout for a session that no longer exists");
        }
        Ok(())
    }
}
