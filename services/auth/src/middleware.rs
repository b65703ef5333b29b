//! Session validation for protected routes

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    cookies,
    error::{AuthError, AuthResult},
    state::AppState,
};

/// Identity of the caller, placed in request extensions by
/// [`require_session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

/// Validate the session cookie and CSRF header before running the handler
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> AuthResult<Response> {
    let session_token = cookies::session_token(&jar);
    let csrf_token = cookies::csrf_token(req.headers());

    let user_id = state
        .validator
        .validate(session_token.as_deref(), csrf_token.as_deref())
        .await?;

    // Add user ID to request extensions for use in handlers
    req.extensions_mut().insert(AuthenticatedUser(user_id));

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(AuthError::Unauthenticated)
    }
}
