//! User endpoints
//!
//! Listing and registration are public. Editing and deleting a user
//! requires being logged in as that very user; deleting is additionally
//! refused while tasks reference the user.
//!
//! # Endpoints
//!
//! - `GET /users/` - List users
//! - `GET|POST /users/create/` - Register
//! - `GET|POST /users/:id/update/` - Edit yourself
//! - `GET|POST /users/:id/delete/` - Delete yourself

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension, Form,
};
use serde::{Deserialize, Serialize};
use taskmanager_shared::{
    auth::{
        authorization::{AccessCheck, SelfOnly},
        caller::Caller,
        password::{hash_password, validate_new_password},
    },
    db::deletion::ProtectedDelete,
    models::user::{CreateUser, UpdateUser, User, UserSummary},
};
use validator::Validate;

use crate::{
    app::AppState,
    error::{unique_as_field, ApiError, ApiResult, FormErrors},
    response::{Flash, Page},
    routes::forms::{DeleteContent, FormContent},
};

pub const USERNAME_TAKEN_MESSAGE: &str = "A user with that username already exists.";
pub const INVALID_USERNAME_MESSAGE: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

const DELETE_GUARD: ProtectedDelete = ProtectedDelete {
    success_url: "/users/",
    success_message: "User successfully deleted",
    denied_url: "/users/",
    denied_message: "Cannot delete a user because it is in use",
};

/// Registration and profile form
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct UserForm {
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub username: String,

    #[serde(default)]
    pub password1: String,

    #[serde(default)]
    pub password2: String,
}

/// A validated user form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanUser {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
}

impl UserForm {
    /// Checks every field and reports all problems at once
    pub fn clean(&self) -> ApiResult<CleanUser> {
        let cleaned = UserForm {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            username: self.username.trim().to_string(),
            password1: self.password1.clone(),
            password2: self.password2.clone(),
        };

        let mut errors = FormErrors::default();
        errors.required("first_name", &cleaned.first_name);
        errors.required("last_name", &cleaned.last_name);
        errors.required("username", &cleaned.username);
        errors.required("password1", &cleaned.password1);
        errors.required("password2", &cleaned.password2);
        for (field, value) in [
            ("first_name", &cleaned.first_name),
            ("last_name", &cleaned.last_name),
            ("password1", &cleaned.password1),
            ("password2", &cleaned.password2),
        ] {
            errors.text(field, value);
        }
        errors.absorb(cleaned.validate());

        if !cleaned.username.is_empty() && !is_valid_username(&cleaned.username) {
            errors.add("username", INVALID_USERNAME_MESSAGE);
        }

        if !errors.has_field("password1") && !errors.has_field("password2") {
            if let Err((field, message)) =
                validate_new_password(&cleaned.password1, &cleaned.password2)
            {
                errors.add(field, message);
            }
        }

        errors.into_result()?;

        Ok(CleanUser {
            first_name: cleaned.first_name,
            last_name: cleaned.last_name,
            username: cleaned.username,
            password: cleaned.password1,
        })
    }
}

/// Letters, digits and `@ . + - _`
fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Editable fields shown on the update page
#[derive(Debug, Serialize)]
pub struct UserFormValues {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserListContent {
    pub users: Vec<UserSummary>,
}

async fn find_user(state: &AppState, id: i64) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))
}

/// `Some(redirect)` when the caller is not `user`
fn deny_unless_self(caller: &Caller, user: &User) -> Option<Response> {
    let denied = SelfOnly.check(caller, user).into_result().err()?;
    tracing::warn!(
        caller_id = ?caller.user_id(),
        target_id = user.id,
        "Attempt to modify another user"
    );
    Some(Flash::from(denied).into_response())
}

/// `GET /users/`
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Page<UserListContent>> {
    let users = User::list(&state.db)
        .await?
        .into_iter()
        .map(UserSummary::from)
        .collect();

    Page::render(&state.db, &caller, "Users", UserListContent { users }).await
}

/// `GET /users/create/`
pub async fn create_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Page<FormContent<Option<UserFormValues>>>> {
    let content = FormContent {
        action: "/users/create/".to_string(),
        form: None,
    };

    Page::render(&state.db, &caller, "Registration", content).await
}

/// `POST /users/create/`
pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<UserForm>,
) -> ApiResult<Flash> {
    let clean = form.clean()?;
    let password_hash = hash_password(&clean.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            username: clean.username,
            first_name: clean.first_name,
            last_name: clean.last_name,
            password_hash,
        },
    )
    .await
    .map_err(unique_as_field("username", USERNAME_TAKEN_MESSAGE))?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    Ok(Flash::success("/login/", "User is successfully registered"))
}

/// `GET /users/:id/update/`
pub async fn update_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let user = find_user(&state, id).await?;
    if let Some(denied) = deny_unless_self(&caller, &user) {
        return Ok(denied);
    }

    let content = FormContent {
        action: format!("/users/{}/update/", id),
        form: Some(UserFormValues {
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
        }),
    };

    Ok(Page::render(&state.db, &caller, "Update user", content)
        .await?
        .into_response())
}

/// `POST /users/:id/update/`
///
/// The form replaces every field, password included.
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Form(form): Form<UserForm>,
) -> ApiResult<Response> {
    let user = find_user(&state, id).await?;
    if let Some(denied) = deny_unless_self(&caller, &user) {
        return Ok(denied);
    }

    let clean = form.clean()?;
    let password_hash = hash_password(&clean.password)?;

    let updated = User::update(
        &state.db,
        id,
        UpdateUser {
            username: clean.username,
            first_name: clean.first_name,
            last_name: clean.last_name,
            password_hash,
        },
    )
    .await
    .map_err(unique_as_field("username", USERNAME_TAKEN_MESSAGE))?
    .ok_or_else(|| ApiError::not_found("User", id))?;

    tracing::info!(user_id = updated.id, "User changed");

    Ok(Flash::success("/users/", "User successfully changed").into_response())
}

/// `GET /users/:id/delete/`
pub async fn delete_page(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let user = find_user(&state, id).await?;
    if let Some(denied) = deny_unless_self(&caller, &user) {
        return Ok(denied);
    }

    let content = DeleteContent {
        action: format!("/users/{}/delete/", id),
        object: UserSummary::from(user),
    };

    Ok(Page::render(&state.db, &caller, "User deletion", content)
        .await?
        .into_response())
}

/// `POST /users/:id/delete/`
pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let user = find_user(&state, id).await?;
    if let Some(denied) = deny_unless_self(&caller, &user) {
        return Ok(denied);
    }

    let outcome = DELETE_GUARD
        .run(|| User::delete(&state.db, id))
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    tracing::info!(user_id = id, location = %outcome.location, "User delete handled");

    Ok(Flash::from(outcome).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> UserForm {
        UserForm {
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            username: "alice".to_string(),
            password1: "pw1".to_string(),
            password2: "pw1".to_string(),
        }
    }

    fn error_fields(result: ApiResult<CleanUser>) -> Vec<String> {
        match result {
            Err(ApiError::ValidationError(details)) => {
                details.into_iter().map(|detail| detail.field).collect()
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_form() {
        let clean = form().clean().unwrap();
        assert_eq!(clean.username, "alice");
        assert_eq!(clean.password, "pw1");
    }

    #[test]
    fn test_all_fields_required() {
        let fields = error_fields(UserForm::default().clean());
        for field in ["first_name", "last_name", "username", "password1", "password2"] {
            assert!(fields.contains(&field.to_string()), "missing {}", field);
        }
    }

    #[test]
    fn test_password_too_short() {
        let mut form = form();
        form.password1 = "ab".to_string();
        form.password2 = "ab".to_string();
        assert_eq!(error_fields(form.clean()), vec!["password1"]);
    }

    #[test]
    fn test_password_mismatch() {
        let mut form = form();
        form.password2 = "pw2".to_string();
        assert_eq!(error_fields(form.clean()), vec!["password2"]);
    }

    #[test]
    fn test_username_characters() {
        assert!(is_valid_username("alice.l+tasks@example-1_x"));
        assert!(!is_valid_username("alice liddell"));
        assert!(!is_valid_username("alice/"));

        let mut form = form();
        form.username = "bad name".to_string();
        assert_eq!(error_fields(form.clean()), vec!["username"]);
    }

    #[test]
    fn test_name_length_limit() {
        let mut form = form();
        form.first_name = "a".repeat(151);
        assert_eq!(error_fields(form.clean()), vec!["first_name"]);
    }

    #[test]
    fn test_null_characters_rejected() {
        let mut form = form();
        form.first_name = "A\0".to_string();
        assert_eq!(error_fields(form.clean()), vec!["first_name"]);

        let mut form = self::form();
        form.username = "al\0ice".to_string();
        assert_eq!(error_fields(form.clean()), vec!["username"]);
    }
}
