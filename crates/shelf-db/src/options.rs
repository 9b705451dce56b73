//! Option schema registry: a product's options and their allowed values.

use chrono::{DateTime, Utc};
use shelf_core::{NewOption, NewOptionValue, OptionSchema, SchemaOption, SchemaValue};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::{atomic, products::lock_product, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OptionRow {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub display_name: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OptionValueRow {
    pub id: i64,
    pub option_id: i64,
    pub value: String,
    pub display_value: String,
    pub color_code: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Options of a product ordered by `sort_order`, then machine name.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_options<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<Vec<OptionRow>, DbError> {
    let rows = sqlx::query_as::<_, OptionRow>(
        "SELECT id, product_id, name, display_name, sort_order, created_at, updated_at \
         FROM product_options \
         WHERE product_id = $1 \
         ORDER BY sort_order, name",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Values of one option ordered by `sort_order`, then machine value.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_values<'e>(
    executor: impl PgExecutor<'e>,
    option_id: i64,
) -> Result<Vec<OptionValueRow>, DbError> {
    let rows = sqlx::query_as::<_, OptionValueRow>(
        "SELECT id, option_id, value, display_value, color_code, sort_order, created_at, updated_at \
         FROM product_option_values \
         WHERE option_id = $1 \
         ORDER BY sort_order, value",
    )
    .bind(option_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Every value of every option of a product, grouped by option and ordered
/// within each option as [`list_values`] orders them.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_values_for_product<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<Vec<OptionValueRow>, DbError> {
    let rows = sqlx::query_as::<_, OptionValueRow>(
        "SELECT v.id, v.option_id, v.value, v.display_value, v.color_code, v.sort_order, \
                v.created_at, v.updated_at \
         FROM product_option_values v \
         JOIN product_options o ON o.id = v.option_id \
         WHERE o.product_id = $1 \
         ORDER BY v.option_id, v.sort_order, v.value",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Load a product's options and values into the resolver used by variant
/// creation and lookup.
///
/// # Errors
///
/// Returns [`DbError`] if either query fails.
pub async fn load_schema(conn: &mut PgConnection, product_id: i64) -> Result<OptionSchema, DbError> {
    let options = list_options(&mut *conn, product_id).await?;
    let values = list_values_for_product(&mut *conn, product_id).await?;

    let schema = options
        .into_iter()
        .map(|option| SchemaOption {
            id: option.id,
            values: values
                .iter()
                .filter(|v| v.option_id == option.id)
                .map(|v| SchemaValue {
                    id: v.id,
                    value: v.value.clone(),
                })
                .collect(),
            name: option.name,
        })
        .collect();

    Ok(OptionSchema::new(schema))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Define an option (and any values it carries) on a product. Idempotent on
/// `(product, name)`: an existing option's id is returned unchanged.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for a missing product,
/// [`DbError::Validation`] for an invalid payload and [`DbError::Conflict`]
/// when a new option would leave existing variants incomplete.
pub async fn define_option(
    pool: &PgPool,
    product_id: i64,
    input: NewOption,
) -> Result<i64, DbError> {
    input.validate()?;

    let option_id = atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;
            define_option_in(conn, product_id, &input).await
        })
    })
    .await?;

    tracing::info!(product_id, option_id, "option defined");
    Ok(option_id)
}

pub(crate) async fn define_option_in(
    conn: &mut PgConnection,
    product_id: i64,
    input: &NewOption,
) -> Result<i64, DbError> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM product_options WHERE product_id = $1 AND name = $2",
    )
    .bind(product_id)
    .bind(&input.name)
    .fetch_optional(&mut *conn)
    .await?;

    let option_id = if let Some(id) = existing {
        id
    } else {
        let has_variants = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM product_variants \
                            WHERE product_id = $1 AND deleted_at IS NULL)",
        )
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;
        if has_variants {
            return Err(DbError::Conflict {
                message: format!(
                    "cannot add option '{}' to a product that already has variants",
                    input.name
                ),
                code: None,
            });
        }

        sqlx::query_scalar::<_, i64>(
            "INSERT INTO product_options (product_id, name, display_name, sort_order) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(product_id)
        .bind(&input.name)
        .bind(input.display())
        .bind(input.sort_order)
        .fetch_one(&mut *conn)
        .await?
    };

    for value in &input.values {
        define_value_in(&mut *conn, option_id, value).await?;
    }

    Ok(option_id)
}

/// Define a value on an option of `product_id`. Idempotent on
/// `(option, value)`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the product is missing or the option
/// does not belong to it, and [`DbError::Validation`] for a blank value.
pub async fn define_value(
    pool: &PgPool,
    product_id: i64,
    option_id: i64,
    input: NewOptionValue,
) -> Result<i64, DbError> {
    input.validate()?;

    let value_id = atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;

            let belongs = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM product_options WHERE id = $1 AND product_id = $2)",
            )
            .bind(option_id)
            .bind(product_id)
            .fetch_one(&mut *conn)
            .await?;
            if !belongs {
                return Err(DbError::not_found("option"));
            }

            define_value_in(conn, option_id, &input).await
        })
    })
    .await?;

    tracing::info!(product_id, option_id, value_id, "option value defined");
    Ok(value_id)
}

async fn define_value_in(
    conn: &mut PgConnection,
    option_id: i64,
    input: &NewOptionValue,
) -> Result<i64, DbError> {
    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO product_option_values (option_id, value, display_value, color_code, sort_order) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (option_id, value) DO NOTHING \
         RETURNING id",
    )
    .bind(option_id)
    .bind(&input.value)
    .bind(input.display())
    .bind(input.color_code.as_deref())
    .bind(input.sort_order)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(id);
    }

    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM product_option_values WHERE option_id = $1 AND value = $2",
    )
    .bind(option_id)
    .bind(&input.value)
    .fetch_one(conn)
    .await?;

    Ok(id)
}
