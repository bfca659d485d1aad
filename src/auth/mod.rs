//! Authentication
//!
//! Handles:
//! - Password hashing
//! - Signed session cookies backed by the sessions table
//! - Authentication middleware

mod middleware;
mod password;
pub mod session;

pub use middleware::{CurrentUser, Viewer, login_redirect, require_auth};
pub use password::{hash_password, verify_password};
pub use session::{SESSION_COOKIE, Session, create_session_token, verify_session_token};
