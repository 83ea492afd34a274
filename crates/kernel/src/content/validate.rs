//! Input validation for content fields.
//!
//! Request bodies arrive as raw JSON so the checks can run in a fixed order:
//! type first, then length, then (for named fields) emptiness. The first
//! failing rule is reported.

use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum length of natural keys (`key`, `slug`, `pageKey`).
pub const MAX_KEY_LENGTH: usize = 255;

/// Maximum length of titles.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Maximum length of excerpts and descriptions.
pub const MAX_SUMMARY_LENGTH: usize = 1000;

/// Maximum length of a single tag.
pub const MAX_TAG_LENGTH: usize = 255;

/// Maximum length of URL fields such as `featuredImage`.
pub const MAX_URL_LENGTH: usize = 2048;

/// Maximum length of raw rich-text content before sanitization (10 MiB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// A rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be a string")]
    NotAString { field: String },

    #[error("{field} exceeds maximum length of {max} characters (got {actual})")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    #[error("{field} cannot be empty")]
    Empty { field: String },

    #[error("{field} must be {expected}")]
    InvalidShape {
        field: String,
        expected: &'static str,
    },
}

/// Validate a required string field: type, then length, then emptiness.
///
/// Returns the owned string on success.
pub fn validate_length(
    value: Option<&Value>,
    max: usize,
    field: &str,
) -> Result<String, ValidationError> {
    let text = check_string_length(value, max, field)?;
    if text.is_empty() {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }
    Ok(text.to_string())
}

/// Validate rich-text content: type, then length. Empty content is allowed.
pub fn validate_content(value: Option<&Value>, max: usize) -> Result<String, ValidationError> {
    check_string_length(value, max, "Content").map(str::to_string)
}

/// Validate an optional string field. Absent or `null` yields `None`;
/// anything else must pass the type and length checks (empty is allowed).
pub fn validate_optional_length(
    value: Option<&Value>,
    max: usize,
    field: &str,
) -> Result<Option<String>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => check_string_length(Some(v), max, field).map(|s| Some(s.to_string())),
    }
}

/// Validate an optional list of tags.
pub fn validate_tags(value: Option<&Value>) -> Result<Option<Vec<String>>, ValidationError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::InvalidShape {
                field: "Tags".to_string(),
                expected: "an array of strings",
            });
        }
    };

    items
        .iter()
        .map(|item| validate_length(Some(item), MAX_TAG_LENGTH, "Tag"))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Validate an optional boolean flag.
pub fn validate_flag(value: Option<&Value>, field: &str) -> Result<Option<bool>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(_) => Err(ValidationError::InvalidShape {
            field: field.to_string(),
            expected: "a boolean",
        }),
    }
}

/// Validate the shape of a page configuration payload.
///
/// The contents are trusted structured data; only the top-level shape is
/// checked.
pub fn validate_config(value: Option<&Value>) -> Result<Value, ValidationError> {
    match value {
        Some(config @ Value::Object(_)) => Ok(config.clone()),
        _ => Err(ValidationError::InvalidShape {
            field: "Config".to_string(),
            expected: "a JSON object",
        }),
    }
}

/// Require a request body to be a JSON object.
pub fn require_object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    body.as_object().ok_or_else(|| ValidationError::InvalidShape {
        field: "Request body".to_string(),
        expected: "a JSON object",
    })
}

fn check_string_length<'a>(
    value: Option<&'a Value>,
    max: usize,
    field: &str,
) -> Result<&'a str, ValidationError> {
    let Some(Value::String(text)) = value else {
        return Err(ValidationError::NotAString {
            field: field.to_string(),
        });
    };

    let actual = text.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual,
        });
    }

    Ok(text.as_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn length_boundary() {
        let at_limit = json!("a".repeat(255));
        assert_eq!(
            validate_length(Some(&at_limit), 255, "Key").unwrap(),
            "a".repeat(255)
        );

        let over = json!("a".repeat(256));
        assert_eq!(
            validate_length(Some(&over), 255, "Key"),
            Err(ValidationError::TooLong {
                field: "Key".to_string(),
                max: 255,
                actual: 256,
            })
        );
    }

    #[test]
    fn empty_field_rejected() {
        let err = validate_length(Some(&json!("")), 255, "Key").unwrap_err();
        assert_eq!(err.to_string(), "Key cannot be empty");
    }

    #[test]
    fn type_checked_before_length() {
        let err = validate_length(Some(&json!(12345)), 2, "Key").unwrap_err();
        assert_eq!(err.to_string(), "Key must be a string");

        let err = validate_length(None, 2, "Key").unwrap_err();
        assert!(matches!(err, ValidationError::NotAString { .. }));
    }

    #[test]
    fn length_error_reports_limit_and_actual() {
        let err = validate_length(Some(&json!("abcd")), 3, "Title").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Title exceeds maximum length of 3 characters (got 4)"
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let value = json!("ééé");
        assert!(validate_length(Some(&value), 3, "Key").is_ok());
    }

    #[test]
    fn content_allows_empty() {
        assert_eq!(
            validate_content(Some(&json!("")), MAX_CONTENT_LENGTH).unwrap(),
            ""
        );
    }

    #[test]
    fn content_checks_type_then_length() {
        let err = validate_content(Some(&json!(["x"])), 1).unwrap_err();
        assert_eq!(err.to_string(), "Content must be a string");

        let err = validate_content(Some(&json!("xy")), 1).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 1, actual: 2, .. }));
    }

    #[test]
    fn optional_fields() {
        assert_eq!(validate_optional_length(None, 10, "Excerpt").unwrap(), None);
        assert_eq!(
            validate_optional_length(Some(&Value::Null), 10, "Excerpt").unwrap(),
            None
        );
        assert_eq!(
            validate_optional_length(Some(&json!("short")), 10, "Excerpt").unwrap(),
            Some("short".to_string())
        );
        assert!(validate_optional_length(Some(&json!(1)), 10, "Excerpt").is_err());
    }

    #[test]
    fn tags_must_be_strings() {
        assert_eq!(
            validate_tags(Some(&json!(["rust", "web"]))).unwrap(),
            Some(vec!["rust".to_string(), "web".to_string()])
        );
        assert!(validate_tags(Some(&json!("rust"))).is_err());
        assert!(validate_tags(Some(&json!(["rust", 3]))).is_err());
        assert_eq!(validate_tags(None).unwrap(), None);
    }

    #[test]
    fn config_must_be_object() {
        assert!(validate_config(Some(&json!({"theme": "dark"}))).is_ok());
        assert!(validate_config(Some(&json!([1, 2]))).is_err());
        assert!(validate_config(None).is_err());
    }

    #[test]
    fn flag_shape() {
        assert_eq!(validate_flag(Some(&json!(true)), "Published").unwrap(), Some(true));
        assert_eq!(validate_flag(None, "Published").unwrap(), None);
        assert!(validate_flag(Some(&json!("yes")), "Published").is_err());
    }
}
