//! Login and logout
//!
//! # Endpoints
//!
//! - `GET /login/` - Login page
//! - `POST /login/` - Check credentials and bind the session to the user
//! - `POST /logout/` - End the session

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Form,
};
use serde::{Deserialize, Serialize};
use taskmanager_shared::{
    auth::{authorization::safe_next, caller::Caller, password::verify_password},
    models::user::User,
};
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, FormErrors},
    response::{Flash, Page, SessionChange},
};

pub const LOGGED_IN_MESSAGE: &str = "You're logged in";
pub const LOGGED_OUT_MESSAGE: &str = "You're logged out";
pub const INVALID_LOGIN_MESSAGE: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// `?next=` of the login page
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login form
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginContent {
    /// Where a successful login will lead
    pub next: Option<String>,
    pub fields: [&'static str; 2],
}

/// `GET /login/`
pub async fn login_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<NextQuery>,
) -> ApiResult<Page<LoginContent>> {
    let content = LoginContent {
        next: safe_next(query.next.as_deref()).map(str::to_string),
        fields: ["username", "password"],
    };

    Page::render(&state.db, &caller, "Enter", content).await
}

/// `POST /login/`
///
/// Unknown usernames and wrong passwords get the same form-wide error.
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> ApiResult<impl IntoResponse> {
    let mut errors = FormErrors::default();
    errors.required("username", &form.username);
    errors.required("password", &form.password);
    errors.text("username", &form.username);
    errors.text("password", &form.password);
    errors.absorb(form.validate());
    errors.into_result()?;

    let user = User::find_by_username(&state.db, form.username.trim()).await?;

    let verified = match &user {
        Some(user) => verify_password(&form.password, &user.password_hash)?,
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        tracing::warn!(username = %form.username, "Failed login attempt");
        return Err(ApiError::field("__all__", INVALID_LOGIN_MESSAGE));
    };

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    let target = safe_next(query.next.as_deref()).unwrap_or("/").to_string();

    Ok((
        SessionChange::Login(user.id),
        Flash::success(target, LOGGED_IN_MESSAGE),
    ))
}

/// `POST /logout/`
///
/// Also accepted from anonymous callers; the result is the same.
pub async fn logout(Extension(caller): Extension<Caller>) -> impl IntoResponse {
    if let Some(user_id) = caller.user_id() {
        tracing::info!(user_id, "User logged out");
    }

    (SessionChange::Logout, Flash::info("/", LOGGED_OUT_MESSAGE))
}
