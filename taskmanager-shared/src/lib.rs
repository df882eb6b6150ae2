//! # Task Manager Shared Library
//!
//! Domain types, storage and access policies used by the Task Manager API
//! server.
//!
//! ## Module Organization
//!
//! - `models`: Database models (users, statuses, labels, tasks, sessions, messages)
//! - `auth`: Password hashing, session tokens and the access policies
//! - `db`: Connection pool, migrations and protected deletion results

pub mod auth;
pub mod db;
pub mod models;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
