//! Product and option-schema payloads.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{require_text, ValidationError};
use crate::variants::validate_price;

/// One allowed value in an option definition payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOptionValue {
    pub value: String,
    pub display_value: Option<String>,
    /// Presentation hint such as a hex colour code.
    pub color_code: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl NewOptionValue {
    /// # Errors
    ///
    /// Returns [`ValidationError`] when `value` is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("value", &self.value)
    }

    /// Display text, falling back to the machine value.
    #[must_use]
    pub fn display(&self) -> &str {
        self.display_value.as_deref().unwrap_or(&self.value)
    }
}

/// An option definition payload, optionally carrying its values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOption {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub values: Vec<NewOptionValue>,
}

impl NewOption {
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the name or any value is blank, or a
    /// value is listed twice.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        let mut seen = std::collections::HashSet::new();
        for value in &self.values {
            value.validate()?;
            if !seen.insert(value.value.as_str()) {
                return Err(ValidationError::new(
                    "values",
                    format!("duplicate value '{}' for option '{}'", value.value, self.name),
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Product creation payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub brand: String,
    pub sku: String,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub category_id: Option<i64>,
    /// Owner override; only honoured for admins.
    pub seller_id: Option<i64>,
    #[serde(default)]
    pub options: Vec<NewOption>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_true() -> bool {
    true
}

impl NewProduct {
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("sku", &self.sku)?;
        validate_price(self.price)?;
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::new(
                "currency",
                "currency must be a 3-letter ISO 4217 code",
            ));
        }

        let mut names = std::collections::HashSet::new();
        for option in &self.options {
            option.validate()?;
            if !names.insert(option.name.as_str()) {
                return Err(ValidationError::new(
                    "options",
                    format!("duplicate option '{}'", option.name),
                ));
            }
        }
        Ok(())
    }
}
