//! Cookie-based session authentication service
//!
//! A login mints two opaque tokens: a session token delivered in an
//! `HttpOnly` cookie and a CSRF token delivered in a script-readable cookie.
//! Protected requests must present both, the CSRF token echoed in the
//! `X-CSRF-Token` header. Sessions live for a fixed period and end on logout.

pub mod activity;
pub mod config;
pub mod cookies;
pub mod error;
pub mod middleware;
pub mod models;
pub mod password;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod token;
pub mod validation;

pub use error::{AuthError, AuthResult};
pub use state::AppState;
