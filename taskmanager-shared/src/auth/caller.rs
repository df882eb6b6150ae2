//! Identity of the caller behind a request
//!
//! The API's session layer resolves the `sessionid` cookie into a [`Caller`]
//! and stores it in the request extensions. Handlers and policies read it
//! from there; nothing else identifies the caller.
//!
//! # Example
//!
//! ```
//! use taskmanager_shared::auth::caller::{Caller, CurrentUser};
//!
//! let anonymous = Caller::anonymous();
//! assert!(!anonymous.is_authenticated());
//!
//! let alice = Caller::authenticated(None, CurrentUser {
//!     id: 1,
//!     username: "alice".to_string(),
//!     full_name: "Alice Liddell".to_string(),
//! });
//! assert_eq!(alice.user_id(), Some(1));
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::User;

/// The logged-in user, as much of it as handlers need
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name(),
        }
    }
}

/// Who is calling
///
/// `session_id` is `None` until the browser has been given a session
/// cookie; `user` is `None` for anonymous callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub session_id: Option<Uuid>,
    pub user: Option<CurrentUser>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(session_id: Option<Uuid>, user: CurrentUser) -> Self {
        Self {
            session_id,
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|user| user.id)
    }
}
