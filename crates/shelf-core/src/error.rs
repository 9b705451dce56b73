//! Error vocabulary shared by every layer.

use thiserror::Error;

/// Stable machine codes attached to documented error cases.
pub mod codes {
    pub const PRODUCT_EXISTS: &str = "PRODUCT_EXISTS";
    pub const CATEGORY_HAS_PRODUCTS: &str = "CATEGORY_HAS_PRODUCTS";
    pub const CATEGORY_HAS_CHILDREN: &str = "CATEGORY_HAS_CHILDREN";
    pub const INVALID_PARENT_CATEGORY: &str = "INVALID_PARENT_CATEGORY";
    pub const ATTRIBUTE_DATA_TYPE_INVALID: &str = "ATTRIBUTE_DATA_TYPE_INVALID";
    pub const ATTRIBUTE_ALREADY_ASSIGNED: &str = "ATTRIBUTE_ALREADY_ASSIGNED";
    pub const ATTRIBUTE_IN_USE: &str = "ATTRIBUTE_IN_USE";
    pub const VARIANT_COMBINATION_EXISTS: &str = "VARIANT_COMBINATION_EXISTS";
    pub const LAST_VARIANT: &str = "LAST_VARIANT";
}

/// The failure classes a catalog operation can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailed,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Integrity,
    Transient,
    Internal,
}

/// A rule violation tied to a named input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    /// Stable machine code for documented cases, e.g. `ATTRIBUTE_DATA_TYPE_INVALID`.
    pub code: Option<&'static str>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    /// Prefix the field with its position in a bulk request, e.g. `items[2].price`.
    #[must_use]
    pub fn at_index(mut self, index: usize) -> Self {
        self.field = format!("items[{index}].{}", self.field);
        self
    }
}

/// Outcome of a pure domain check that is not a plain field validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// Names the missing entity, e.g. `"option 'Size'"`.
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

impl RuleViolation {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuleViolation::Invalid(_) => ErrorKind::ValidationFailed,
            RuleViolation::NotFound(_) => ErrorKind::NotFound,
            RuleViolation::Conflict(_) => ErrorKind::Conflict,
        }
    }
}

/// Reject empty or whitespace-only text for a required field.
///
/// # Errors
///
/// Returns [`ValidationError`] naming `field` when `value` is blank.
pub fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_index_prefixes_field() {
        let err = ValidationError::new("price", "price must be greater than 0").at_index(3);
        assert_eq!(err.field, "items[3].price");
        assert_eq!(err.to_string(), "items[3].price: price must be greater than 0");
    }

    #[test]
    fn rule_violation_kinds() {
        let invalid: RuleViolation = ValidationError::new("x", "bad").into();
        assert_eq!(invalid.kind(), ErrorKind::ValidationFailed);
        assert_eq!(
            RuleViolation::NotFound("option 'Size'".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RuleViolation::Conflict("dup".into()).kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn require_text_rejects_whitespace() {
        assert!(require_text("name", "  ").is_err());
        assert!(require_text("name", "Size").is_ok());
    }
}
