//! Session lifecycle: issuing on login, validating on every protected
//! request, revoking on logout.
//!
//! Each component receives its collaborators (store, token generator,
//! credential verifier, activity recorder) at construction. Nothing here
//! reaches for global state.

pub mod issuer;
pub mod revoker;
pub mod validator;

pub use issuer::{IssuedSession, SessionIssuer};
pub use revoker::SessionRevoker;
pub use validator::SessionValidator;
