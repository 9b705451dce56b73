//! Database operations for the `products` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shelf_core::{codes, NewProduct};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::{atomic, options, text_array::encode_text_array, text_array::TextArray, DbError};

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A live row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
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
    pub images: TextArray,
    pub tags: TextArray,
    pub is_popular: bool,
    pub in_stock: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns a live product by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or an array column is malformed.
pub async fn get_product<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, seller_id, category_id, name, brand, sku, price, currency, \
                short_description, description, images::text AS images, tags::text AS tags, \
                is_popular, in_stock, is_active, created_at, updated_at \
         FROM products \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Returns the owning seller of a live product, or `None`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn get_product_owner<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<Option<i64>, DbError> {
    let owner = sqlx::query_scalar::<_, i64>(
        "SELECT seller_id FROM products WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await?;

    Ok(owner)
}

/// Lock a live product row for the rest of the transaction and return its
/// owner.
///
/// Every write that touches a product's options, variants or attributes
/// takes this lock first, so concurrent writers of one product run one at a
/// time.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the product is missing or deleted.
pub async fn lock_product(conn: &mut PgConnection, product_id: i64) -> Result<i64, DbError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT seller_id FROM products WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("product"))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Create a product owned by `seller_id`, together with any inline option
/// schema, and return the inserted row.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an invalid payload,
/// [`DbError::NotFound`] for an unknown category and [`DbError::Conflict`]
/// (`PRODUCT_EXISTS`) when the SKU is already used by a live product.
pub async fn create_product(
    pool: &PgPool,
    seller_id: i64,
    input: NewProduct,
) -> Result<ProductRow, DbError> {
    input.validate()?;

    let product = atomic(pool, move |conn| {
        Box::pin(async move { create_product_in(conn, seller_id, &input).await })
    })
    .await?;

    tracing::info!(product_id = product.id, seller_id, sku = %product.sku, "product created");
    Ok(product)
}

async fn create_product_in(
    conn: &mut PgConnection,
    seller_id: i64,
    input: &NewProduct,
) -> Result<ProductRow, DbError> {
    if let Some(category_id) = input.category_id {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)",
        )
        .bind(category_id)
        .fetch_one(&mut *conn)
        .await?;
        if !exists {
            return Err(DbError::not_found("category"));
        }
    }

    let sku_taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM products WHERE sku = $1 AND deleted_at IS NULL)",
    )
    .bind(&input.sku)
    .fetch_one(&mut *conn)
    .await?;
    if sku_taken {
        return Err(DbError::conflict(
            "a product with this SKU already exists",
            codes::PRODUCT_EXISTS,
        ));
    }

    let product_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products \
             (seller_id, category_id, name, brand, sku, price, currency, short_description, \
              description, images, tags, is_popular, in_stock, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::text[], $11::text[], $12, $13, $14) \
         RETURNING id",
    )
    .bind(seller_id)
    .bind(input.category_id)
    .bind(input.name.trim())
    .bind(&input.brand)
    .bind(&input.sku)
    .bind(input.price)
    .bind(&input.currency)
    .bind(input.short_description.as_deref())
    .bind(input.description.as_deref())
    .bind(encode_text_array(&input.images))
    .bind(encode_text_array(&input.tags))
    .bind(input.is_popular)
    .bind(input.in_stock)
    .bind(input.is_active)
    .fetch_one(&mut *conn)
    .await?;

    for option in &input.options {
        options::define_option_in(&mut *conn, product_id, option).await?;
    }

    get_product(&mut *conn, product_id)
        .await?
        .ok_or_else(|| DbError::Corrupt(format!("product {product_id} vanished after insert")))
}

/// Soft-delete a product with its variants and attributes.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the product is missing or already
/// deleted.
pub async fn delete_product(pool: &PgPool, product_id: i64) -> Result<(), DbError> {
    atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;

            sqlx::query(
                "UPDATE variant_option_values SET deleted_at = NOW() \
                 WHERE deleted_at IS NULL \
                   AND variant_id IN (SELECT id FROM product_variants WHERE product_id = $1)",
            )
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "UPDATE product_variants \
                 SET deleted_at = NOW(), is_default = FALSE, updated_at = NOW() \
                 WHERE product_id = $1 AND deleted_at IS NULL",
            )
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "UPDATE product_attributes SET deleted_at = NOW(), updated_at = NOW() \
                 WHERE product_id = $1 AND deleted_at IS NULL",
            )
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "UPDATE products SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1",
            )
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

            Ok(())
        })
    })
    .await?;

    tracing::info!(product_id, "product deleted");
    Ok(())
}
