//! Access checks
//!
//! Two kinds of checks guard the task manager's handlers:
//!
//! 1. **Authentication** ([`Authenticated`]): the caller must be logged in.
//!    Runs before any handler logic.
//! 2. **Ownership** ([`SelfOnly`], [`AuthorOnly`]): the caller must own the
//!    already loaded target. Runs after authentication, at dispatch time,
//!    before any GET/POST-specific logic.
//!
//! A check never fails with an error. It answers [`Access::Allow`] or
//! [`Access::Deny`] carrying the redirect and the error notice to queue.
//! Ownership is plain primary-key equality: no hierarchy, no delegation,
//! no groups.
//!
//! # Example
//!
//! ```
//! use taskmanager_shared::auth::authorization::{Access, AccessCheck, Authenticated};
//! use taskmanager_shared::auth::caller::Caller;
//!
//! let denied = Authenticated.check(&Caller::anonymous(), "/tasks/");
//! match denied {
//!     Access::Deny(outcome) => assert_eq!(outcome.location, "/login/?next=/tasks/"),
//!     Access::Allow => unreachable!(),
//! }
//! ```

use serde::Serialize;

use super::caller::Caller;
use crate::models::{message::Notice, task::Task, user::User};

/// Login entry point
pub const LOGIN_URL: &str = "/login/";

pub const NOT_AUTHENTICATED_MESSAGE: &str = "You are not authorised! Please log in.";
pub const NOT_SELF_MESSAGE: &str = "You don't have the rights to modify another user.";
pub const NOT_AUTHOR_MESSAGE: &str = "Only its author can delete a task";

/// A redirect plus the single notice to show on the next page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub location: String,
    pub notice: Notice,
}

impl Outcome {
    pub fn new(location: impl Into<String>, notice: Notice) -> Self {
        Self {
            location: location.into(),
            notice,
        }
    }
}

/// Verdict of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny(Outcome),
}

impl Access {
    /// `Ok(())` when allowed, the rejection otherwise
    pub fn into_result(self) -> Result<(), Outcome> {
        match self {
            Access::Allow => Ok(()),
            Access::Deny(outcome) => Err(outcome),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

/// A check of the caller against a target
pub trait AccessCheck<T: ?Sized> {
    fn check(&self, caller: &Caller, target: &T) -> Access;
}

/// Caller must be logged in; the target is the requested path and query
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

impl AccessCheck<str> for Authenticated {
    fn check(&self, caller: &Caller, requested: &str) -> Access {
        if caller.is_authenticated() {
            Access::Allow
        } else {
            Access::Deny(Outcome::new(
                login_url(requested),
                Notice::error(NOT_AUTHENTICATED_MESSAGE),
            ))
        }
    }
}

/// A user record may only be changed by that same user
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfOnly;

impl SelfOnly {
    pub const REDIRECT: &'static str = "/users/";
}

impl AccessCheck<User> for SelfOnly {
    fn check(&self, caller: &Caller, target: &User) -> Access {
        if caller.user_id() == Some(target.id) {
            Access::Allow
        } else {
            Access::Deny(Outcome::new(Self::REDIRECT, Notice::error(NOT_SELF_MESSAGE)))
        }
    }
}

/// A task may only be deleted by its author
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorOnly;

impl AuthorOnly {
    pub const REDIRECT: &'static str = "/tasks/";
}

impl AccessCheck<Task> for AuthorOnly {
    fn check(&self, caller: &Caller, target: &Task) -> Access {
        if caller.user_id() == Some(target.author_id) {
            Access::Allow
        } else {
            Access::Deny(Outcome::new(Self::REDIRECT, Notice::error(NOT_AUTHOR_MESSAGE)))
        }
    }
}

/// `/login/?next=<requested>`, with `requested` percent-encoded
///
/// Unreserved characters and `/` are kept as is, so `/tasks/` stays
/// readable while `?` and `&` of a query string are escaped.
pub fn login_url(requested: &str) -> String {
    format!("{}?next={}", LOGIN_URL, encode_next(requested))
}

fn encode_next(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Accepts a `next` target only if it stays on this site
///
/// Absolute URLs and protocol-relative `//host` paths are refused.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|target| {
        target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
    })
}
