//! Form helpers shared by the entity handlers

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ApiResult, FormErrors, INVALID_CHOICE_MESSAGE};

/// The single-field form of statuses and labels
#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct NameForm {
    #[serde(default)]
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub name: String,
}

impl NameForm {
    /// The trimmed name, or every field error
    pub fn clean(&self) -> ApiResult<String> {
        let cleaned = NameForm {
            name: self.name.trim().to_string(),
        };

        let mut errors = FormErrors::default();
        errors.required("name", &cleaned.name);
        errors.text("name", &cleaned.name);
        errors.absorb(cleaned.validate());
        errors.into_result()?;

        Ok(cleaned.name)
    }
}

/// Body of a create or update page
#[derive(Debug, Serialize)]
pub struct FormContent<T: Serialize> {
    /// Where the form posts to
    pub action: String,
    pub form: T,
}

/// Body of a delete confirmation page
#[derive(Debug, Serialize)]
pub struct DeleteContent<T: Serialize> {
    pub action: String,
    pub object: T,
}

/// Parses the id of a selected option
///
/// An empty value is "nothing selected". Anything that is not an id is
/// recorded as an invalid choice.
pub fn parse_choice(field: &str, raw: Option<&str>, errors: &mut FormErrors) -> Option<i64> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return None;
    }

    match raw.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, INVALID_CHOICE_MESSAGE);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, REQUIRED_MESSAGE};

    #[test]
    fn test_name_form_trims() {
        let form = NameForm {
            name: "  in progress ".to_string(),
        };
        assert_eq!(form.clean().unwrap(), "in progress");
    }

    #[test]
    fn test_name_form_requires_name() {
        let form = NameForm {
            name: "   ".to_string(),
        };
        match form.clean() {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "name");
                assert_eq!(details[0].message, REQUIRED_MESSAGE);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_name_form_limits_length() {
        let form = NameForm {
            name: "x".repeat(256),
        };
        assert!(form.clean().is_err());

        let form = NameForm {
            name: "x".repeat(255),
        };
        assert!(form.clean().is_ok());
    }

    #[test]
    fn test_parse_choice() {
        let mut errors = FormErrors::default();

        assert_eq!(parse_choice("status", Some("3"), &mut errors), Some(3));
        assert_eq!(parse_choice("status", Some(""), &mut errors), None);
        assert_eq!(parse_choice("status", None, &mut errors), None);
        assert!(errors.is_empty());

        assert_eq!(parse_choice("status", Some("abc"), &mut errors), None);
        assert!(errors.has_field("status"));
    }

    #[test]
    fn test_name_form_rejects_null_characters() {
        let form = NameForm {
            name: "bad\0name".to_string(),
        };
        match form.clean() {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details[0].field, "name");
                assert_eq!(details[0].message, crate::error::NULL_CHARACTER_MESSAGE);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
