//! Response shapes. Rows from `shelf-db` are flattened projections; these
//! types assemble them into the documented camelCase JSON views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shelf_db::{
    AttributeDefinitionRow, CategoryRow, OptionRow, OptionValueRow, ProductAttributeRow, ProductRow,
    ProductSummaryRow, SelectedOptionRow, VariantDetail, VariantRow,
};

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProductSummaryView {
    pub id: i64,
    pub name: String,
    pub brand: String,
}

impl From<ProductSummaryRow> for ProductSummaryView {
    fn from(row: ProductSummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            brand: row.brand,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SelectedOptionView {
    pub option_id: i64,
    pub option_name: String,
    pub option_display_name: String,
    pub value_id: i64,
    pub value: String,
    pub value_display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_code: Option<String>,
}

impl From<SelectedOptionRow> for SelectedOptionView {
    fn from(row: SelectedOptionRow) -> Self {
        Self {
            option_id: row.option_id,
            option_name: row.option_name,
            option_display_name: row.option_display_name,
            value_id: row.value_id,
            value: row.value,
            value_display_name: row.value_display_name,
            color_code: row.color_code,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VariantView {
    pub id: i64,
    pub product_id: i64,
    pub sku: String,
    pub price: Decimal,
    pub stock: i32,
    pub images: Vec<String>,
    pub allow_purchase: bool,
    pub is_popular: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummaryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_options: Option<Vec<SelectedOptionView>>,
}

impl From<VariantRow> for VariantView {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            sku: row.sku,
            price: row.price,
            stock: row.stock,
            images: row.images.into_inner(),
            allow_purchase: row.allow_purchase,
            is_popular: row.is_popular,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
            product: None,
            selected_options: None,
        }
    }
}

impl From<VariantDetail> for VariantView {
    fn from(detail: VariantDetail) -> Self {
        let mut view = VariantView::from(detail.variant);
        view.product = Some(detail.product.into());
        view.selected_options = Some(
            detail
                .selected_options
                .into_iter()
                .map(SelectedOptionView::from)
                .collect(),
        );
        view
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BulkUpdateView<T: Serialize> {
    pub updated_count: usize,
    pub items: Vec<T>,
}

impl<T: Serialize> BulkUpdateView<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            updated_count: items.len(),
            items,
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OptionValueView {
    pub id: i64,
    pub value: String,
    pub display_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_code: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OptionView {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub sort_order: i32,
    pub values: Vec<OptionValueView>,
}

/// Nest values under their options, keeping both orderings from the store.
pub(super) fn option_views(options: Vec<OptionRow>, values: Vec<OptionValueRow>) -> Vec<OptionView> {
    let mut views: Vec<OptionView> = options
        .into_iter()
        .map(|o| OptionView {
            id: o.id,
            name: o.name,
            display_name: o.display_name,
            sort_order: o.sort_order,
            values: Vec::new(),
        })
        .collect();

    for value in values {
        if let Some(view) = views.iter_mut().find(|v| v.id == value.option_id) {
            view.values.push(OptionValueView {
                id: value.id,
                value: value.value,
                display_value: value.display_value,
                color_code: value.color_code,
                sort_order: value.sort_order,
            });
        }
    }
    views
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProductView {
    pub id: i64,
    pub seller_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub brand: String,
    pub sku: String,
    pub price: Decimal,
    pub currency: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub is_popular: bool,
    pub in_stock: bool,
    pub is_active: bool,
    pub options: Vec<OptionView>,
    pub default_variant_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    pub fn new(row: ProductRow, options: Vec<OptionView>, default_variant_id: Option<i64>) -> Self {
        Self {
            id: row.id,
            seller_id: row.seller_id,
            category_id: row.category_id,
            name: row.name,
            brand: row.brand,
            sku: row.sku,
            price: row.price,
            currency: row.currency.trim_end().to_string(),
            short_description: row.short_description,
            description: row.description,
            images: row.images.into_inner(),
            tags: row.tags.into_inner(),
            is_popular: row.is_popular,
            in_stock: row.in_stock,
            is_active: row.is_active,
            options,
            default_variant_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AttributeView {
    pub id: i64,
    pub product_id: i64,
    pub attribute_definition_id: i64,
    pub attribute_key: String,
    pub name: String,
    pub unit: Option<String>,
    pub data_type: String,
    pub value: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductAttributeRow> for AttributeView {
    fn from(row: ProductAttributeRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            attribute_definition_id: row.attribute_definition_id,
            attribute_key: row.attribute_key,
            name: row.name,
            unit: row.unit,
            data_type: row.data_type,
            value: row.value,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AttributeDefinitionView {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub unit: Option<String>,
    pub data_type: String,
    pub value_policy: String,
    pub allowed_values: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AttributeDefinitionRow> for AttributeDefinitionView {
    fn from(row: AttributeDefinitionRow) -> Self {
        Self {
            id: row.id,
            key: row.key,
            name: row.name,
            unit: row.unit,
            data_type: row.data_type,
            value_policy: row.value_policy,
            allowed_values: row.allowed_values.into_inner(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CategoryView {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CategoryRow> for CategoryView {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

/// Id of a newly defined entity.
#[derive(Debug, Serialize)]
pub(super) struct CreatedId {
    pub id: i64,
}
