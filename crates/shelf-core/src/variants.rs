//! Variant payloads and the option-combination rules they must satisfy.
//!
//! Everything here is pure: the persistence layer loads the product's option
//! schema and existing combinations, then asks these types whether a write
//! may proceed.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{require_text, RuleViolation, ValidationError};

/// One `{optionName, value}` pair in a create payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSelection {
    pub option_name: String,
    pub value: String,
}

impl OptionSelection {
    pub fn new(option_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            option_name: option_name.into(),
            value: value.into(),
        }
    }
}

/// Create payload exactly as received. Every field is optional so that
/// validation can name whichever one is missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    pub allow_purchase: Option<bool>,
    pub is_popular: Option<bool>,
    pub is_default: Option<bool>,
    pub options: Option<Vec<OptionSelection>>,
}

/// A validated create payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub sku: String,
    pub price: Decimal,
    pub stock: i32,
    pub images: Vec<String>,
    pub allow_purchase: bool,
    pub is_popular: bool,
    pub is_default: bool,
    pub options: Vec<OptionSelection>,
}

impl TryFrom<VariantInput> for NewVariant {
    type Error = ValidationError;

    fn try_from(input: VariantInput) -> Result<Self, Self::Error> {
        let price = input
            .price
            .ok_or_else(|| ValidationError::new("price", "price is required"))?;
        validate_price(price)?;

        let stock = input.stock.unwrap_or(0);
        validate_stock(stock)?;

        let options = input.options.unwrap_or_default();
        validate_selections(&options)?;

        Ok(Self {
            sku: input.sku.unwrap_or_default(),
            price,
            stock,
            images: input.images.unwrap_or_default(),
            allow_purchase: input.allow_purchase.unwrap_or(true),
            is_popular: input.is_popular.unwrap_or(false),
            is_default: input.is_default.unwrap_or(false),
            options,
        })
    }
}

/// Sparse update for a single variant. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantPatch {
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    pub allow_purchase: Option<bool>,
    pub is_popular: Option<bool>,
    pub is_default: Option<bool>,
}

impl VariantPatch {
    /// # Errors
    ///
    /// Returns [`ValidationError`] for a non-positive price or negative stock.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(stock) = self.stock {
            validate_stock(stock)?;
        }
        Ok(())
    }
}

/// One entry of a bulk update: the target id plus its patch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkVariantPatch {
    pub id: i64,
    #[serde(flatten)]
    pub patch: VariantPatch,
}

/// Validate a bulk request before anything is written.
///
/// Duplicate ids are reported as a lookup failure on the repeated id.
///
/// # Errors
///
/// Returns [`RuleViolation::Invalid`] for an empty list or an invalid item,
/// and [`RuleViolation::NotFound`] for a repeated id.
pub fn validate_bulk_variant_patches(items: &[BulkVariantPatch]) -> Result<(), RuleViolation> {
    if items.is_empty() {
        return Err(ValidationError::new("items", "at least one variant is required").into());
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err(RuleViolation::NotFound(format!("variant {}", item.id)));
        }
    }

    for (index, item) in items.iter().enumerate() {
        item.patch.validate().map_err(|e| e.at_index(index))?;
    }
    Ok(())
}

/// Largest integer part a stored price may carry (`NUMERIC(12, 2)`).
const MAX_PRICE_INTEGER_DIGITS: u32 = 10;
const MAX_PRICE_SCALE: u32 = 2;

/// Check a price against the stored precision: positive, at most two
/// decimal places, at most ten integer digits.
///
/// # Errors
///
/// Returns [`ValidationError`] on the `price` field otherwise.
pub fn validate_price(price: Decimal) -> Result<(), ValidationError> {
    if price <= Decimal::ZERO {
        return Err(ValidationError::new("price", "price must be greater than 0"));
    }
    if price.normalize().scale() > MAX_PRICE_SCALE {
        return Err(ValidationError::new(
            "price",
            format!("price must have at most {MAX_PRICE_SCALE} decimal places"),
        ));
    }
    if price.trunc() >= Decimal::from(10_i64.pow(MAX_PRICE_INTEGER_DIGITS)) {
        return Err(ValidationError::new(
            "price",
            format!("price must have at most {MAX_PRICE_INTEGER_DIGITS} integer digits"),
        ));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<(), ValidationError> {
    if stock < 0 {
        return Err(ValidationError::new("stock", "stock cannot be negative"));
    }
    Ok(())
}

fn validate_selections(options: &[OptionSelection]) -> Result<(), ValidationError> {
    if options.is_empty() {
        return Err(ValidationError::new(
            "options",
            "at least one option is required",
        ));
    }

    let mut seen = HashSet::with_capacity(options.len());
    for selection in options {
        require_text("optionName", &selection.option_name)?;
        require_text("value", &selection.value)?;
        if !seen.insert(selection.option_name.as_str()) {
            return Err(ValidationError::new(
                "options",
                format!("duplicate option '{}' in request", selection.option_name),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Option schema and combinations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SchemaValue {
    pub id: i64,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct SchemaOption {
    pub id: i64,
    pub name: String,
    pub values: Vec<SchemaValue>,
}

/// The set of `(option_id, value_id)` pairs bound to a variant, kept sorted
/// so that equality is combination equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination(Vec<(i64, i64)>);

impl Combination {
    pub fn new(pairs: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let mut pairs: Vec<(i64, i64)> = pairs.into_iter().collect();
        pairs.sort_unstable();
        pairs.dedup();
        Self(pairs)
    }

    #[must_use]
    pub fn pairs(&self) -> &[(i64, i64)] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parallel `(option_ids, value_ids)` vectors, ready for `UNNEST` binding.
    #[must_use]
    pub fn columns(&self) -> (Vec<i64>, Vec<i64>) {
        self.0.iter().copied().unzip()
    }
}

/// A product's options and their allowed values, matched by exact
/// (case-sensitive) machine name and machine value.
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    options: Vec<SchemaOption>,
}

impl OptionSchema {
    #[must_use]
    pub fn new(options: Vec<SchemaOption>) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    fn option_named(&self, name: &str) -> Option<&SchemaOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Resolve a create payload into the combination it denotes. The payload
    /// must name every option exactly once.
    ///
    /// # Errors
    ///
    /// [`RuleViolation::NotFound`] for an undefined option or value,
    /// [`RuleViolation::Invalid`] for a duplicate or missing option.
    pub fn resolve_complete(
        &self,
        selections: &[OptionSelection],
    ) -> Result<Combination, RuleViolation> {
        let mut seen = HashSet::with_capacity(selections.len());
        let mut pairs = Vec::with_capacity(selections.len());

        for selection in selections {
            if !seen.insert(selection.option_name.as_str()) {
                return Err(ValidationError::new(
                    "options",
                    format!("duplicate option '{}' in request", selection.option_name),
                )
                .into());
            }
            pairs.push(self.resolve_pair(&selection.option_name, &selection.value)?);
        }

        let missing: Vec<&str> = self
            .options
            .iter()
            .filter(|o| !seen.contains(o.name.as_str()))
            .map(|o| o.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::new(
                "options",
                format!("missing value for option(s): {}", missing.join(", ")),
            )
            .into());
        }

        Ok(Combination::new(pairs))
    }

    /// Resolve a lookup selection. Unlike [`Self::resolve_complete`] the
    /// selection may constrain only some of the options.
    ///
    /// # Errors
    ///
    /// [`RuleViolation::Invalid`] for an empty selection or a name that is not
    /// an option of the product; [`RuleViolation::NotFound`] when a value is
    /// not defined, since no variant can match it.
    pub fn resolve_lookup(
        &self,
        selection: &BTreeMap<String, String>,
    ) -> Result<Combination, RuleViolation> {
        if selection.is_empty() {
            return Err(ValidationError::new(
                "options",
                "at least one option must be selected",
            )
            .into());
        }

        if let Some(unknown) = selection.keys().find(|k| self.option_named(k).is_none()) {
            return Err(
                ValidationError::new(unknown.clone(), format!("Invalid option name: {unknown}"))
                    .into(),
            );
        }

        let mut pairs = Vec::with_capacity(selection.len());
        for (name, value) in selection {
            let pair = self
                .resolve_pair(name, value)
                .map_err(|_| RuleViolation::NotFound("variant".to_string()))?;
            pairs.push(pair);
        }
        Ok(Combination::new(pairs))
    }

    fn resolve_pair(&self, name: &str, value: &str) -> Result<(i64, i64), RuleViolation> {
        let option = self
            .option_named(name)
            .ok_or_else(|| RuleViolation::NotFound(format!("option '{name}'")))?;
        let found = option
            .values
            .iter()
            .find(|v| v.value == value)
            .ok_or_else(|| {
                RuleViolation::NotFound(format!("value '{value}' for option '{name}'"))
            })?;
        Ok((option.id, found.id))
    }
}

/// Return the id of an existing variant that already carries `candidate`.
#[must_use]
#[allow(clippy::implicit_hasher)] // callers build the map with the default hasher
pub fn find_duplicate_combination(
    candidate: &Combination,
    existing: &HashMap<i64, Combination>,
) -> Option<i64> {
    existing
        .iter()
        .filter(|(_, combination)| *combination == candidate)
        .map(|(id, _)| *id)
        .min()
}

#[cfg(test)]
#[path = "variants_test.rs"]
mod tests;
