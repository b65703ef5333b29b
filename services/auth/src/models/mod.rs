//! Authentication service models

pub mod session;
pub mod user;

// Re-export for convenience
pub use session::{CsrfToken, SessionToken};
pub use user::{LoginCredentials, NewUser, RegisterRequest, User};
