//! Attribute definitions: data types, value policies, and the admission
//! rule applied whenever a product attribute value is written.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::codes::ATTRIBUTE_DATA_TYPE_INVALID;
use crate::error::{require_text, RuleViolation, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeDataType {
    #[default]
    Text,
    Number,
    Boolean,
}

impl AttributeDataType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeDataType::Text => "text",
            AttributeDataType::Number => "number",
            AttributeDataType::Boolean => "boolean",
        }
    }

    /// # Errors
    ///
    /// Returns [`ValidationError`] with code `ATTRIBUTE_DATA_TYPE_INVALID`
    /// when `value` does not parse as this type.
    pub fn check(self, value: &str) -> Result<(), ValidationError> {
        let ok = match self {
            AttributeDataType::Text => true,
            AttributeDataType::Number => Decimal::from_str(value.trim()).is_ok(),
            AttributeDataType::Boolean => matches!(value, "true" | "false"),
        };
        if ok {
            Ok(())
        } else {
            Err(ValidationError::new(
                "value",
                format!("value '{value}' is not a valid {}", self.as_str()),
            )
            .with_code(ATTRIBUTE_DATA_TYPE_INVALID))
        }
    }
}

impl FromStr for AttributeDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(AttributeDataType::Text),
            "number" => Ok(AttributeDataType::Number),
            "boolean" => Ok(AttributeDataType::Boolean),
            other => Err(format!("unknown attribute data type '{other}'")),
        }
    }
}

/// How a definition's `allowed_values` constrain writes.
///
/// `Open` definitions accept any value and record it in `allowed_values`;
/// `Closed` definitions accept only values already listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuePolicy {
    #[default]
    Open,
    Closed,
}

impl ValuePolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ValuePolicy::Open => "open",
            ValuePolicy::Closed => "closed",
        }
    }
}

impl FromStr for ValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ValuePolicy::Open),
            "closed" => Ok(ValuePolicy::Closed),
            other => Err(format!("unknown value policy '{other}'")),
        }
    }
}

/// Result of admitting a value against a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Already listed; nothing to record.
    Listed,
    /// Accepted by an open definition and must be appended to its list.
    Learned,
}

/// Decide whether `value` may be stored under a definition.
///
/// # Errors
///
/// Returns [`ValidationError`] for an empty value, a data-type mismatch, or
/// an unlisted value on a closed definition.
pub fn admit_value(
    data_type: AttributeDataType,
    policy: ValuePolicy,
    allowed_values: &[String],
    value: &str,
) -> Result<Admission, ValidationError> {
    require_text("value", value)?;
    data_type.check(value)?;

    if allowed_values.iter().any(|v| v == value) {
        return Ok(Admission::Listed);
    }
    match policy {
        ValuePolicy::Open => Ok(Admission::Learned),
        ValuePolicy::Closed => Err(ValidationError::new(
            "value",
            format!(
                "value '{value}' is not allowed; expected one of: {}",
                allowed_values.join(", ")
            ),
        )),
    }
}

/// Payload for attaching an attribute to a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProductAttribute {
    pub attribute_key: String,
    pub name: String,
    pub unit: Option<String>,
    pub value: String,
    pub sort_order: Option<i32>,
    /// Only consulted when the key has no definition yet.
    pub data_type: Option<AttributeDataType>,
    /// Policy of a newly minted definition; `open` when absent.
    pub value_policy: Option<ValuePolicy>,
    /// Initial allowed values of a newly minted definition. Defaults to the
    /// incoming `value`.
    pub allowed_values: Option<Vec<String>>,
}

impl NewProductAttribute {
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required field is blank or a seeded
    /// allowed value is blank, repeated, or does not parse for the data type.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("attributeKey", &self.attribute_key)?;
        require_text("name", &self.name)?;
        require_text("value", &self.value)?;

        if let Some(values) = &self.allowed_values {
            let data_type = self.data_type.unwrap_or_default();
            let mut seen = std::collections::HashSet::with_capacity(values.len());
            for value in values {
                require_text("allowedValues", value)?;
                data_type.check(value).map_err(|e| ValidationError {
                    field: "allowedValues".to_string(),
                    ..e
                })?;
                if !seen.insert(value.as_str()) {
                    return Err(ValidationError::new(
                        "allowedValues",
                        format!("duplicate allowed value '{value}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Allowed values a minted definition starts with.
    #[must_use]
    pub fn seed_values(&self) -> Vec<String> {
        self.allowed_values
            .clone()
            .unwrap_or_else(|| vec![self.value.clone()])
    }
}

/// Admin change to an existing definition's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionPolicyPatch {
    pub value_policy: ValuePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributePatch {
    pub value: String,
    pub sort_order: Option<i32>,
}

impl AttributePatch {
    /// # Errors
    ///
    /// Returns [`ValidationError`] when `value` is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("value", &self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAttributePatch {
    pub id: i64,
    #[serde(flatten)]
    pub patch: AttributePatch,
}

/// Validate a bulk attribute request before anything is written.
///
/// # Errors
///
/// Returns [`RuleViolation::Invalid`] for an empty list or an invalid item,
/// and [`RuleViolation::NotFound`] for a repeated id.
pub fn validate_bulk_attribute_patches(items: &[BulkAttributePatch]) -> Result<(), RuleViolation> {
    if items.is_empty() {
        return Err(ValidationError::new("items", "at least one attribute is required").into());
    }
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err(RuleViolation::NotFound(format!("attribute {}", item.id)));
        }
    }
    for (index, item) in items.iter().enumerate() {
        item.patch.validate().map_err(|e| e.at_index(index))?;
    }
    Ok(())
}
