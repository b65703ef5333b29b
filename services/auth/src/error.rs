//! Error taxonomy for the session service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Custom error type for authentication and session errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are never told apart
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid session")]
    InvalidSession,

    #[error("session expired")]
    SessionExpired,

    #[error("missing csrf token")]
    MissingCsrf,

    #[error("invalid csrf token")]
    InvalidCsrf,

    /// A handler asked for the caller's identity on a request that never
    /// went through session validation
    #[error("user ID not found in request")]
    Unauthenticated,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Store, entropy or hashing failure; details are logged, never returned
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Internal(anyhow::Error::new(err))
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidSession
            | AuthError::SessionExpired
            | AuthError::MissingCsrf
            | AuthError::InvalidCsrf
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
        }
    }

    fn failure(message: String) -> Self {
        Self {
            error: true,
            message,
            data: None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(err) => {
                error!("Internal error while serving request: {:#}", err);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

/// Type alias for results produced by the session core and handlers
pub type AuthResult<T> = Result<T, AuthError>;
