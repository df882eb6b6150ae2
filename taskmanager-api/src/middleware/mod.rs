//! Middleware for the API server
//!
//! - `session`: resolves the caller and persists notices and login changes
//! - `login_required`: the authentication gate for protected routes
//! - `security`: security response headers

pub mod login_required;
pub mod security;
pub mod session;
