//! Typed ID definitions for portal resources.

use std::fmt;

use crate::{define_id, IdError, MAX_ID_LEN};

// =============================================================================
// Scheduling
// =============================================================================

define_id!(TaskId, "task id");
define_id!(EmployeeId, "employee id");

// =============================================================================
// Portal identities
// =============================================================================

define_id!(Username, "username");

/// Shared validation for every generated ID type.
#[doc(hidden)]
pub fn validate(kind: &'static str, s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong {
            len: s.len(),
            max: MAX_ID_LEN,
        });
    }

    if let Some(ch) = s
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#'))
    {
        return Err(IdError::InvalidChar {
            kind,
            ch,
            value: s.to_string(),
        });
    }

    Ok(())
}

/// Accepts either a JSON string or an integer.
#[doc(hidden)]
pub struct RawIdVisitor;

impl<'de> serde::de::Visitor<'de> for RawIdVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or integer identifier")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }
}
