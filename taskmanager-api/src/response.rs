//! Response building blocks shared by every handler
//!
//! - [`Flash`]: a `303 See Other` redirect carrying the one notice the next
//!   page will show.
//! - [`SessionChange`]: tells the session layer to log the caller in or out.
//! - [`Page`]: the JSON body of a rendered page, with the consumed messages.
//!
//! Handlers never touch the session store directly. They attach notices and
//! session changes to the response extensions and
//! [`crate::middleware::session::session_layer`] persists them once the
//! handler has finished.

use axum::{
    http::StatusCode,
    response::{IntoResponse, IntoResponseParts, Redirect, Response, ResponseParts},
    Json,
};
use serde::Serialize;
use sqlx::PgPool;
use std::convert::Infallible;
use taskmanager_shared::{
    auth::{authorization::Outcome, caller::{Caller, CurrentUser}},
    models::message::{Message, Notice},
};

use crate::error::ApiResult;

/// Redirect plus a queued notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash(pub Outcome);

impl Flash {
    pub fn success(location: impl Into<String>, message: impl Into<String>) -> Self {
        Flash(Outcome::new(location, Notice::success(message)))
    }

    pub fn info(location: impl Into<String>, message: impl Into<String>) -> Self {
        Flash(Outcome::new(location, Notice::info(message)))
    }

    pub fn location(&self) -> &str {
        &self.0.location
    }
}

impl From<Outcome> for Flash {
    fn from(outcome: Outcome) -> Self {
        Flash(outcome)
    }
}

impl IntoResponse for Flash {
    fn into_response(self) -> Response {
        let Outcome { location, notice } = self.0;
        let mut response = Redirect::to(&location).into_response();
        response.extensions_mut().insert(notice);
        response
    }
}

/// Login state transition requested by a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    /// Bind the session to this user under a fresh token
    Login(i64),

    /// Drop the session and everything queued on it
    Logout,
}

impl IntoResponseParts for SessionChange {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

/// A rendered page
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub title: String,

    /// Logged-in user, absent for anonymous callers
    pub user: Option<CurrentUser>,

    /// Notices queued since the last rendered page, oldest first
    pub messages: Vec<Notice>,

    #[serde(flatten)]
    pub content: T,
}

impl<T: Serialize> Page<T> {
    /// Builds a page, consuming the caller's queued messages
    pub async fn render(
        db: &PgPool,
        caller: &Caller,
        title: impl Into<String>,
        content: T,
    ) -> ApiResult<Self> {
        let messages = match caller.session_id {
            Some(session_id) => Message::take_all(db, session_id).await?,
            None => Vec::new(),
        };

        Ok(Self {
            title: title.into(),
            user: caller.user.clone(),
            messages,
            content,
        })
    }
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use taskmanager_shared::models::message::Level;

    #[test]
    fn test_flash_is_see_other_with_notice() {
        let response = Flash::success("/statuses/", "Status successfully created").into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/statuses/");

        let notice = response.extensions().get::<Notice>().unwrap();
        assert_eq!(notice.level, Level::Success);
        assert_eq!(notice.message, "Status successfully created");
    }

    #[test]
    fn test_session_change_travels_in_extensions() {
        let response = (SessionChange::Logout, Flash::info("/", "You're logged out")).into_response();

        assert_eq!(response.extensions().get::<SessionChange>(), Some(&SessionChange::Logout));
        assert_eq!(response.extensions().get::<Notice>().unwrap().level, Level::Info);
    }

    #[test]
    fn test_page_flattens_content() {
        #[derive(Serialize)]
        struct Content {
            statuses: Vec<&'static str>,
        }

        let page = Page {
            title: "Statuses".to_string(),
            user: None,
            messages: vec![Notice::success("Status successfully created")],
            content: Content { statuses: vec!["new"] },
        };

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["title"], "Statuses");
        assert_eq!(json["statuses"][0], "new");
        assert_eq!(json["messages"][0]["level"], "success");
        assert!(json["user"].is_null());
    }
}
