//! Content input handling.
//!
//! This module provides:
//! - Sanitization of rich text (allow-list HTML) and plain text
//! - Field validation (type, length, emptiness) for request payloads

mod sanitize;
pub mod validate;

pub use sanitize::{is_allowed_url, sanitize_plain_text, sanitize_rich_text};
pub use validate::{ValidationError, validate_content, validate_length};
