//! Authentication
//!
//! Handles:
//! - Password hashing
//! - Session login/logout and the current-user extractors
//! - Password reset tokens
//! - Safe post-login redirects

mod middleware;
pub mod password;
mod redirect;
pub mod reset;
pub mod session;
mod token;

pub use middleware::{
    CurrentUser, MaybeUser, SESSION_COOKIE, extract_token_from_headers, require_auth,
};
pub use redirect::{DEFAULT_REDIRECT, login_url, redirect_target, safe_next};
pub use reset::{ResetClaims, ResetTokenService};
pub use session::{
    Identity, Session, SessionService, create_session_token, verify_session_token,
};
