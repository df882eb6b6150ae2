//! Error handling for the API server
//!
//! Handlers return `ApiResult<T>`. Policy rejections are not errors: they
//! are ordinary redirects (see [`crate::response::Flash`]). What ends up
//! here is what the caller has to fix in the form (422), a missing entity
//! (404), or a genuine server failure (500).
//!
//! # Example
//!
//! ```
//! use taskmanager_api::error::{ApiError, FormErrors};
//!
//! let mut errors = FormErrors::default();
//! errors.required("name", "");
//! assert!(matches!(errors.into_result(), Err(ApiError::ValidationError(_))));
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskmanager_shared::{auth::password::PasswordError, db::deletion::is_unique_violation};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_CHOICE_MESSAGE: &str = "Select a valid choice.";
pub const NULL_CHARACTER_MESSAGE: &str = "Null characters are not allowed.";

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Unauthorized (401)
    Unauthorized(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), a constraint the form could not attribute to a field
    Conflict(String),

    /// Unprocessable entity (422): the submitted form is invalid
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation (`__all__` for form-wide errors)
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "not_found", "validation_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Field errors of an invalid form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// A single field error
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }

    pub fn not_found(entity: &str, id: i64) -> Self {
        ApiError::NotFound(format!("{} {} not found", entity, id))
    }
}

/// Maps a unique violation to a field error, anything else as usual
///
/// ```ignore
/// Status::create(&db, &name)
///     .await
///     .map_err(unique_as_field("name", "Status with this Name already exists."))?;
/// ```
pub fn unique_as_field(
    field: &'static str,
    message: &'static str,
) -> impl FnOnce(sqlx::Error) -> ApiError {
    move |err| {
        if is_unique_violation(&err) {
            ApiError::field(field, message)
        } else {
            ApiError::from(err)
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Please correct the errors below.".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Logged, never shown to the client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                    return ApiError::Conflict(format!(
                        "Constraint violation: {}",
                        db_err.constraint().unwrap_or("unknown")
                    ));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert `validator` errors to field errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(details_from(&errors))
    }
}

fn details_from(errors: &validator::ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

/// Accumulates every field error of a form before answering
///
/// A form reports all of its problems at once, the way a re-rendered HTML
/// form would.
#[derive(Debug, Default)]
pub struct FormErrors {
    details: Vec<ValidationErrorDetail>,
}

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.details.push(ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Flags an empty (after trimming) required value
    pub fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, REQUIRED_MESSAGE);
        }
    }

    /// Flags text Postgres cannot store
    ///
    /// Checked on every submitted text field, including passwords.
    pub fn text(&mut self, field: &str, value: &str) {
        if value.contains('\0') {
            self.add(field, NULL_CHARACTER_MESSAGE);
        }
    }

    /// Merges the outcome of a `validator::Validate::validate` call
    pub fn absorb(&mut self, result: Result<(), validator::ValidationErrors>) {
        if let Err(errors) = result {
            self.details.extend(details_from(&errors));
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.details.iter().any(|detail| detail.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn into_error(self) -> ApiError {
        ApiError::ValidationError(self.details)
    }

    pub fn into_result(self) -> ApiResult<()> {
        if self.details.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError(self.details))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct NameForm {
        #[validate(length(max = 5, message = "Too long"))]
        name: String,
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::Conflict("Constraint violation: users_username_key".to_string());
        assert_eq!(err.to_string(), "Conflict: Constraint violation: users_username_key");

        let err = ApiError::not_found("Status", 7);
        assert_eq!(err.to_string(), "Not found: Status 7 not found");
    }

    #[test]
    fn test_validation_error_status_code() {
        let response = ApiError::field("name", REQUIRED_MESSAGE).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = ApiError::InternalError("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_unique_as_field_passes_other_errors_through() {
        let err = unique_as_field("name", "taken")(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, ApiError::InternalError(_)));
    }

    #[test]
    fn test_form_errors_accumulate() {
        let mut errors = FormErrors::default();
        errors.required("name", "   ");
        errors.required("description", "filled");
        errors.absorb(NameForm { name: "too long".to_string() }.validate());

        assert!(errors.has_field("name"));
        assert!(!errors.has_field("description"));

        match errors.into_result() {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details.len(), 2);
                assert_eq!(details[0].message, REQUIRED_MESSAGE);
                assert_eq!(details[1].message, "Too long");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_null_characters_are_field_errors() {
        let mut errors = FormErrors::default();
        errors.text("name", "bad\0name");
        errors.text("description", "fine");

        assert!(errors.has_field("name"));
        assert!(!errors.has_field("description"));

        match errors.into_result() {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].message, NULL_CHARACTER_MESSAGE);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_form_errors_are_ok() {
        let errors = FormErrors::default();
        assert!(errors.is_empty());
        assert!(errors.into_result().is_ok());
    }
}
