//! Read operations for variants and their selected options.

use std::collections::{BTreeMap, HashMap};

use shelf_core::Combination;
use sqlx::{PgExecutor, PgPool};

use super::types::{ProductSummaryRow, SelectedOptionRow, VariantDetail, VariantRow};
use crate::{
    batch::{preload_selected_options, BatchConfig},
    options::load_schema,
    DbError,
};

/// Returns a live variant of `product_id`, or `None` if the variant is
/// missing, deleted or belongs to another product.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn get_variant<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
    variant_id: i64,
) -> Result<Option<VariantRow>, DbError> {
    let row = sqlx::query_as::<_, VariantRow>(
        "SELECT id, product_id, sku, price, stock, images::text AS images, allow_purchase, \
                is_popular, is_default, created_at, updated_at \
         FROM product_variants \
         WHERE id = $1 AND product_id = $2 AND deleted_at IS NULL",
    )
    .bind(variant_id)
    .bind(product_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Live variants of a product, default first, then by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_variants<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<Vec<VariantRow>, DbError> {
    let rows = sqlx::query_as::<_, VariantRow>(
        "SELECT id, product_id, sku, price, stock, images::text AS images, allow_purchase, \
                is_popular, is_default, created_at, updated_at \
         FROM product_variants \
         WHERE product_id = $1 AND deleted_at IS NULL \
         ORDER BY is_default DESC, id",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Live variants of a product restricted to `variant_ids`, ordered by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_variants_by_ids<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
    variant_ids: &[i64],
) -> Result<Vec<VariantRow>, DbError> {
    if variant_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, VariantRow>(
        "SELECT id, product_id, sku, price, stock, images::text AS images, allow_purchase, \
                is_popular, is_default, created_at, updated_at \
         FROM product_variants \
         WHERE product_id = $1 AND id = ANY($2) AND deleted_at IS NULL \
         ORDER BY id",
    )
    .bind(product_id)
    .bind(variant_ids)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Id of the product's live default variant, if it has one.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn default_variant_id<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM product_variants \
         WHERE product_id = $1 AND is_default AND deleted_at IS NULL",
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await?;

    Ok(id)
}

/// Selected options of the given variants, ordered per variant by the
/// option's `sort_order`, then option name. Tombstoned bindings are skipped.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_selected_options<'e>(
    executor: impl PgExecutor<'e>,
    variant_ids: &[i64],
) -> Result<Vec<SelectedOptionRow>, DbError> {
    if variant_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, SelectedOptionRow>(
        "SELECT vov.variant_id, \
                o.id AS option_id, \
                o.name AS option_name, \
                o.display_name AS option_display_name, \
                o.sort_order AS option_sort_order, \
                v.id AS value_id, \
                v.value, \
                v.display_value AS value_display_name, \
                v.color_code \
         FROM variant_option_values vov \
         JOIN product_options o ON o.id = vov.option_id \
         JOIN product_option_values v ON v.id = vov.option_value_id \
         WHERE vov.variant_id = ANY($1) AND vov.deleted_at IS NULL \
         ORDER BY vov.variant_id, o.sort_order, o.name",
    )
    .bind(variant_ids)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Returns `{id, name, brand}` for a live product.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn get_product_summary<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<Option<ProductSummaryRow>, DbError> {
    let row = sqlx::query_as::<_, ProductSummaryRow>(
        "SELECT id, name, brand FROM products WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Load the detail view of one variant, or `None` when either the product or
/// the variant is not live.
///
/// # Errors
///
/// Returns [`DbError`] if any query fails.
pub async fn get_variant_detail(
    pool: &PgPool,
    product_id: i64,
    variant_id: i64,
) -> Result<Option<VariantDetail>, DbError> {
    let Some(product) = get_product_summary(pool, product_id).await? else {
        return Ok(None);
    };
    let Some(variant) = get_variant(pool, product_id, variant_id).await? else {
        return Ok(None);
    };
    let selected_options = list_selected_options(pool, &[variant_id]).await?;

    Ok(Some(VariantDetail {
        variant,
        product,
        selected_options,
    }))
}

/// Detail views for `variants` of one product. Selected options are
/// preloaded through the batch helper; a variant whose chunk failed is
/// returned with an empty option list rather than failing the whole read.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the product is not live.
pub async fn list_variant_details(
    pool: &PgPool,
    product_id: i64,
    variants: Vec<VariantRow>,
    batch: BatchConfig,
) -> Result<Vec<VariantDetail>, DbError> {
    let product = get_product_summary(pool, product_id)
        .await?
        .ok_or_else(|| DbError::not_found("product"))?;

    let ids: Vec<i64> = variants.iter().map(|v| v.id).collect();
    let mut selected = preload_selected_options(pool, ids, batch).await;

    Ok(variants
        .into_iter()
        .map(|variant| VariantDetail {
            selected_options: selected.remove(&variant.id).unwrap_or_default(),
            product: product.clone(),
            variant,
        })
        .collect())
}

/// Option-value combinations of every live variant of a product, keyed by
/// variant id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn load_combinations<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<HashMap<i64, Combination>, DbError> {
    let rows = sqlx::query_as::<_, (i64, i64, i64)>(
        "SELECT vov.variant_id, vov.option_id, vov.option_value_id \
         FROM variant_option_values vov \
         JOIN product_variants pv ON pv.id = vov.variant_id \
         WHERE pv.product_id = $1 AND pv.deleted_at IS NULL AND vov.deleted_at IS NULL",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    let mut pairs: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
    for (variant_id, option_id, value_id) in rows {
        pairs.entry(variant_id).or_default().push((option_id, value_id));
    }

    Ok(pairs
        .into_iter()
        .map(|(variant_id, pairs)| (variant_id, Combination::new(pairs)))
        .collect())
}

/// Resolve an option selection to a live variant.
///
/// The selection may constrain only some options; when several variants
/// match, the default wins, then the lowest id.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an empty selection or an unknown
/// option name, and [`DbError::NotFound`] when no live variant matches.
pub async fn find_variant_by_options(
    pool: &PgPool,
    product_id: i64,
    selection: &BTreeMap<String, String>,
) -> Result<VariantRow, DbError> {
    let mut conn = pool.acquire().await?;
    let schema = load_schema(&mut conn, product_id).await?;
    let combination = schema.resolve_lookup(selection)?;
    let (option_ids, value_ids) = combination.columns();
    let wanted = i64::try_from(combination.len()).unwrap_or(i64::MAX);

    sqlx::query_as::<_, VariantRow>(
        "SELECT pv.id, pv.product_id, pv.sku, pv.price, pv.stock, pv.images::text AS images, \
                pv.allow_purchase, pv.is_popular, pv.is_default, pv.created_at, pv.updated_at \
         FROM product_variants pv \
         WHERE pv.product_id = $1 AND pv.deleted_at IS NULL \
           AND (SELECT COUNT(*) \
                FROM variant_option_values vov \
                JOIN UNNEST($2::bigint[], $3::bigint[]) AS sel(option_id, option_value_id) \
                  ON sel.option_id = vov.option_id AND sel.option_value_id = vov.option_value_id \
                WHERE vov.variant_id = pv.id AND vov.deleted_at IS NULL) = $4 \
         ORDER BY pv.is_default DESC, pv.id \
         LIMIT 1",
    )
    .bind(product_id)
    .bind(&option_ids)
    .bind(&value_ids)
    .bind(wanted)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("variant"))
}
