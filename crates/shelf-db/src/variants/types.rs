use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::text_array::TextArray;

/// A live row from the `product_variants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariantRow {
    pub id: i64,
    pub product_id: i64,
    pub sku: String,
    pub price: Decimal,
    pub stock: i32,
    pub images: TextArray,
    pub allow_purchase: bool,
    pub is_popular: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One option value bound to a variant, flattened with its option and value
/// display data.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SelectedOptionRow {
    pub variant_id: i64,
    pub option_id: i64,
    pub option_name: String,
    pub option_display_name: String,
    pub option_sort_order: i32,
    pub value_id: i64,
    pub value: String,
    pub value_display_name: String,
    pub color_code: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductSummaryRow {
    pub id: i64,
    pub name: String,
    pub brand: String,
}

/// A variant with everything its detail view shows.
#[derive(Debug, Clone)]
pub struct VariantDetail {
    pub variant: VariantRow,
    pub product: ProductSummaryRow,
    /// Ordered by the option's `sort_order`, then option name.
    pub selected_options: Vec<SelectedOptionRow>,
}
