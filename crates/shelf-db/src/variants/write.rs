//! Write operations for the variant manifold. Every function here runs
//! inside [`atomic`] and locks the product row first.

use shelf_core::{
    codes, find_duplicate_combination, validate_bulk_variant_patches, BulkVariantPatch, NewVariant,
    ValidationError, VariantPatch,
};
use sqlx::{PgConnection, PgPool};

use super::read::load_combinations;
use super::types::VariantRow;
use crate::{
    atomic, options::load_schema, products::lock_product, text_array::encode_text_array, DbError,
};

/// Create a variant at a new option combination and return its id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for a missing product, option or value,
/// [`DbError::Validation`] when the selection is incomplete or repeats an
/// option, and [`DbError::Conflict`] (`VARIANT_COMBINATION_EXISTS`) when a
/// live variant already carries the combination.
pub async fn create_variant(
    pool: &PgPool,
    product_id: i64,
    input: NewVariant,
) -> Result<i64, DbError> {
    let variant_id = atomic(pool, move |conn| {
        Box::pin(async move { create_variant_in(conn, product_id, &input).await })
    })
    .await?;

    tracing::info!(product_id, variant_id, "variant created");
    Ok(variant_id)
}

async fn create_variant_in(
    conn: &mut PgConnection,
    product_id: i64,
    input: &NewVariant,
) -> Result<i64, DbError> {
    lock_product(&mut *conn, product_id).await?;

    let schema = load_schema(&mut *conn, product_id).await?;
    let combination = schema.resolve_complete(&input.options)?;

    let existing = load_combinations(&mut *conn, product_id).await?;
    if let Some(duplicate_of) = find_duplicate_combination(&combination, &existing) {
        tracing::debug!(product_id, duplicate_of, "variant combination already taken");
        return Err(DbError::conflict(
            "combination already exists",
            codes::VARIANT_COMBINATION_EXISTS,
        ));
    }

    if input.is_default {
        clear_other_defaults(&mut *conn, product_id, None).await?;
    }

    let variant_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO product_variants \
             (product_id, sku, price, stock, images, allow_purchase, is_popular, is_default) \
         VALUES ($1, $2, $3, $4, $5::text[], $6, $7, $8) \
         RETURNING id",
    )
    .bind(product_id)
    .bind(&input.sku)
    .bind(input.price)
    .bind(input.stock)
    .bind(encode_text_array(&input.images))
    .bind(input.allow_purchase)
    .bind(input.is_popular)
    .bind(input.is_default)
    .fetch_one(&mut *conn)
    .await?;

    let (option_ids, value_ids) = combination.columns();
    sqlx::query(
        "INSERT INTO variant_option_values (variant_id, option_id, option_value_id) \
         SELECT $1, * FROM UNNEST($2::bigint[], $3::bigint[])",
    )
    .bind(variant_id)
    .bind(&option_ids)
    .bind(&value_ids)
    .execute(&mut *conn)
    .await?;

    Ok(variant_id)
}

/// Apply a sparse patch to one variant and return the updated row.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an invalid patch and
/// [`DbError::NotFound`] when the product or variant is missing, deleted, or
/// the variant belongs to another product.
pub async fn update_variant(
    pool: &PgPool,
    product_id: i64,
    variant_id: i64,
    patch: VariantPatch,
) -> Result<VariantRow, DbError> {
    patch.validate()?;

    let row = atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;
            update_variant_in(conn, product_id, variant_id, &patch)
                .await?
                .ok_or_else(|| DbError::not_found("variant"))
        })
    })
    .await?;

    tracing::info!(product_id, variant_id, "variant updated");
    Ok(row)
}

/// Apply patches in list order inside one transaction and return the ids
/// that were actually updated. Ids that are unknown, deleted, or belong to
/// another product are skipped.
///
/// # Errors
///
/// Returns [`DbError::Validation`] when the list is empty or any item is
/// invalid, [`DbError::NotFound`] for a repeated id or a missing product.
/// Nothing is written in either case.
pub async fn bulk_update_variants(
    pool: &PgPool,
    product_id: i64,
    items: Vec<BulkVariantPatch>,
) -> Result<Vec<i64>, DbError> {
    validate_bulk_variant_patches(&items)?;

    let applied = atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;
            let mut applied = Vec::with_capacity(items.len());
            for item in &items {
                if update_variant_in(&mut *conn, product_id, item.id, &item.patch)
                    .await?
                    .is_some()
                {
                    applied.push(item.id);
                }
            }
            Ok(applied)
        })
    })
    .await?;

    tracing::info!(product_id, updated = applied.len(), "variants bulk updated");
    Ok(applied)
}

async fn update_variant_in(
    conn: &mut PgConnection,
    product_id: i64,
    variant_id: i64,
    patch: &VariantPatch,
) -> Result<Option<VariantRow>, DbError> {
    let live = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM product_variants \
         WHERE id = $1 AND product_id = $2 AND deleted_at IS NULL \
         FOR UPDATE",
    )
    .bind(variant_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    if live.is_none() {
        return Ok(None);
    }

    if patch.is_default == Some(true) {
        clear_other_defaults(&mut *conn, product_id, Some(variant_id)).await?;
    }

    let images = patch.images.as_deref().map(encode_text_array);

    let row = sqlx::query_as::<_, VariantRow>(
        "UPDATE product_variants SET \
             sku            = COALESCE($3, sku), \
             price          = COALESCE($4, price), \
             stock          = COALESCE($5, stock), \
             images         = COALESCE($6::text[], images), \
             allow_purchase = COALESCE($7, allow_purchase), \
             is_popular     = COALESCE($8, is_popular), \
             is_default     = COALESCE($9, is_default), \
             updated_at     = NOW() \
         WHERE id = $1 AND product_id = $2 \
         RETURNING id, product_id, sku, price, stock, images::text AS images, allow_purchase, \
                   is_popular, is_default, created_at, updated_at",
    )
    .bind(variant_id)
    .bind(product_id)
    .bind(patch.sku.as_deref())
    .bind(patch.price)
    .bind(patch.stock)
    .bind(images)
    .bind(patch.allow_purchase)
    .bind(patch.is_popular)
    .bind(patch.is_default)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Some(row))
}

/// Soft-delete a variant and tombstone its option bindings. The product's
/// last live variant cannot be deleted.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the product or variant is not live and
/// [`DbError::Validation`] (`LAST_VARIANT`) for the last remaining variant.
pub async fn delete_variant(pool: &PgPool, product_id: i64, variant_id: i64) -> Result<(), DbError> {
    atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;

            let live: Vec<i64> = sqlx::query_scalar::<_, i64>(
                "SELECT id FROM product_variants \
                 WHERE product_id = $1 AND deleted_at IS NULL",
            )
            .bind(product_id)
            .fetch_all(&mut *conn)
            .await?;

            if !live.contains(&variant_id) {
                return Err(DbError::not_found("variant"));
            }
            if live.len() <= 1 {
                return Err(ValidationError::new(
                    "variantId",
                    "cannot delete the last remaining variant of a product",
                )
                .with_code(codes::LAST_VARIANT)
                .into());
            }

            sqlx::query(
                "UPDATE product_variants \
                 SET deleted_at = NOW(), is_default = FALSE, updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(variant_id)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "UPDATE variant_option_values SET deleted_at = NOW() \
                 WHERE variant_id = $1 AND deleted_at IS NULL",
            )
            .bind(variant_id)
            .execute(&mut *conn)
            .await?;

            Ok(())
        })
    })
    .await?;

    tracing::info!(product_id, variant_id, "variant deleted");
    Ok(())
}

/// Clear `is_default` on every live variant of the product except `keep`.
async fn clear_other_defaults(
    conn: &mut PgConnection,
    product_id: i64,
    keep: Option<i64>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE product_variants SET is_default = FALSE, updated_at = NOW() \
         WHERE product_id = $1 AND is_default AND deleted_at IS NULL \
           AND ($2::bigint IS NULL OR id <> $2)",
    )
    .bind(product_id)
    .bind(keep)
    .execute(conn)
    .await?;
    Ok(())
}
