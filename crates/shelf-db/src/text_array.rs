//! Codec for PostgreSQL `text[]` literals.
//!
//! Array columns are written by binding [`encode_text_array`]'s output with a
//! `$n::text[]` cast and read back by selecting `column::text` into a
//! [`TextArray`].

use std::ops::Deref;

use sqlx::{
    error::BoxDynError,
    postgres::{PgTypeInfo, PgValueRef},
    Decode, Postgres, Type,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArrayCodecError {
    #[error("array literal must be wrapped in braces: {0:?}")]
    MissingBraces(String),
    #[error("array literal ends inside an escape sequence")]
    DanglingEscape,
    #[error("array literal has an unterminated quoted element")]
    UnterminatedQuote,
    #[error("nested arrays are not supported")]
    Nested,
}

/// Render `items` as a `text[]` literal. Every element is quoted so empty
/// strings, commas and braces survive the round trip.
#[must_use]
pub fn encode_text_array<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return "{}".to_string();
    }
    let mut out = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        for ch in item.as_ref().chars() {
            if ch == '"' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
        out.push('"');
    }
    out.push('}');
    out
}

/// Parse a `text[]` literal as produced by [`encode_text_array`] or by
/// Postgres' own array output (which leaves simple elements unquoted).
///
/// # Errors
///
/// Returns [`ArrayCodecError`] when the literal is not a flat, well-formed
/// array.
pub fn decode_text_array(literal: &str) -> Result<Vec<String>, ArrayCodecError> {
    let inner = literal
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| ArrayCodecError::MissingBraces(literal.to_string()))?;

    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in inner.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => items.push(std::mem::take(&mut current)),
            '{' | '}' if !in_quotes => return Err(ArrayCodecError::Nested),
            _ => current.push(ch),
        }
    }

    if escaped {
        return Err(ArrayCodecError::DanglingEscape);
    }
    if in_quotes {
        return Err(ArrayCodecError::UnterminatedQuote);
    }
    items.push(current);
    Ok(items)
}

/// A `text[]` column read through its literal form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextArray(pub Vec<String>);

impl TextArray {
    #[must_use]
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl Deref for TextArray {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Type<Postgres> for TextArray {
    fn type_info() -> PgTypeInfo {
        <str as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <str as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for TextArray {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let literal = <&str as Decode<Postgres>>::decode(value)?;
        Ok(TextArray(decode_text_array(literal)?))
    }
}
