//! Product attribute store and attribute definitions.

use chrono::{DateTime, Utc};
use shelf_core::{
    admit_value, codes, validate_bulk_attribute_patches, Admission, AttributeDataType,
    AttributePatch, BulkAttributePatch, NewProductAttribute, ValuePolicy,
};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::{
    atomic, products::lock_product, text_array::encode_text_array, text_array::TextArray, DbError,
};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttributeDefinitionRow {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub unit: Option<String>,
    pub data_type: String,
    pub value_policy: String,
    pub allowed_values: TextArray,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttributeDefinitionRow {
    /// # Errors
    ///
    /// Returns [`DbError::Corrupt`] for a value the column check should have
    /// rejected.
    pub fn data_type(&self) -> Result<AttributeDataType, DbError> {
        self.data_type
            .parse()
            .map_err(|_| DbError::Corrupt(format!("attribute definition {}: data_type", self.id)))
    }

    /// # Errors
    ///
    /// Returns [`DbError::Corrupt`] for a value the column check should have
    /// rejected.
    pub fn value_policy(&self) -> Result<ValuePolicy, DbError> {
        self.value_policy
            .parse()
            .map_err(|_| DbError::Corrupt(format!("attribute definition {}: value_policy", self.id)))
    }
}

/// A live product attribute joined with its definition.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductAttributeRow {
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

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Live attributes of a product ordered by `sort_order`, then creation time.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_product_attributes<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
) -> Result<Vec<ProductAttributeRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductAttributeRow>(
        "SELECT pa.id, pa.product_id, pa.attribute_definition_id, d.key AS attribute_key, \
                d.name, d.unit, d.data_type, pa.value, pa.sort_order, pa.created_at, pa.updated_at \
         FROM product_attributes pa \
         JOIN attribute_definitions d ON d.id = pa.attribute_definition_id \
         WHERE pa.product_id = $1 AND pa.deleted_at IS NULL \
         ORDER BY pa.sort_order, pa.created_at, pa.id",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Returns one live attribute of a product, or `None`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn get_product_attribute<'e>(
    executor: impl PgExecutor<'e>,
    product_id: i64,
    attribute_id: i64,
) -> Result<Option<ProductAttributeRow>, DbError> {
    let row = sqlx::query_as::<_, ProductAttributeRow>(
        "SELECT pa.id, pa.product_id, pa.attribute_definition_id, d.key AS attribute_key, \
                d.name, d.unit, d.data_type, pa.value, pa.sort_order, pa.created_at, pa.updated_at \
         FROM product_attributes pa \
         JOIN attribute_definitions d ON d.id = pa.attribute_definition_id \
         WHERE pa.id = $1 AND pa.product_id = $2 AND pa.deleted_at IS NULL",
    )
    .bind(attribute_id)
    .bind(product_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// All attribute definitions ordered by key.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_attribute_definitions<'e>(
    executor: impl PgExecutor<'e>,
) -> Result<Vec<AttributeDefinitionRow>, DbError> {
    let rows = sqlx::query_as::<_, AttributeDefinitionRow>(
        "SELECT id, key, name, unit, data_type, value_policy, \
                allowed_values::text AS allowed_values, created_at, updated_at \
         FROM attribute_definitions \
         ORDER BY key",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Returns one attribute definition by key, or `None`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn get_attribute_definition_by_key<'e>(
    executor: impl PgExecutor<'e>,
    key: &str,
) -> Result<Option<AttributeDefinitionRow>, DbError> {
    let row = sqlx::query_as::<_, AttributeDefinitionRow>(
        "SELECT id, key, name, unit, data_type, value_policy, \
                allowed_values::text AS allowed_values, created_at, updated_at \
         FROM attribute_definitions \
         WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

async fn lock_definition(
    conn: &mut PgConnection,
    definition_id: i64,
) -> Result<AttributeDefinitionRow, DbError> {
    sqlx::query_as::<_, AttributeDefinitionRow>(
        "SELECT id, key, name, unit, data_type, value_policy, \
                allowed_values::text AS allowed_values, created_at, updated_at \
         FROM attribute_definitions \
         WHERE id = $1 \
         FOR UPDATE",
    )
    .bind(definition_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("attribute definition"))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Attach an attribute to a product, minting a definition for an unseen
/// key. A minted definition takes the requested policy (default `open`) and
/// starts from the requested allowed values (default: the incoming value).
///
/// # Errors
///
/// Returns [`DbError::Validation`] when the value is blank, does not parse
/// for the definition's data type, or is not listed on a closed definition;
/// [`DbError::Conflict`] (`ATTRIBUTE_ALREADY_ASSIGNED`) when the product
/// already carries the attribute; [`DbError::NotFound`] for a missing product.
pub async fn set_product_attribute(
    pool: &PgPool,
    product_id: i64,
    input: NewProductAttribute,
) -> Result<ProductAttributeRow, DbError> {
    input.validate()?;

    let row = atomic(pool, move |conn| {
        Box::pin(async move { set_product_attribute_in(conn, product_id, &input).await })
    })
    .await?;

    tracing::info!(
        product_id,
        attribute_id = row.id,
        key = %row.attribute_key,
        "product attribute set"
    );
    Ok(row)
}

async fn set_product_attribute_in(
    conn: &mut PgConnection,
    product_id: i64,
    input: &NewProductAttribute,
) -> Result<ProductAttributeRow, DbError> {
    lock_product(&mut *conn, product_id).await?;

    let minted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO attribute_definitions \
             (key, name, unit, data_type, value_policy, allowed_values) \
         VALUES ($1, $2, $3, $4, $5, $6::text[]) \
         ON CONFLICT (key) DO NOTHING \
         RETURNING id",
    )
    .bind(&input.attribute_key)
    .bind(&input.name)
    .bind(input.unit.as_deref())
    .bind(input.data_type.unwrap_or_default().as_str())
    .bind(input.value_policy.unwrap_or_default().as_str())
    .bind(encode_text_array(&input.seed_values()))
    .fetch_optional(&mut *conn)
    .await?;

    let definition_id = match minted {
        Some(id) => {
            tracing::debug!(key = %input.attribute_key, definition_id = id, "attribute definition minted");
            id
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT id FROM attribute_definitions WHERE key = $1")
                .bind(&input.attribute_key)
                .fetch_one(&mut *conn)
                .await?
        }
    };

    let definition = lock_definition(&mut *conn, definition_id).await?;
    let admission = admit_value(
        definition.data_type()?,
        definition.value_policy()?,
        &definition.allowed_values,
        &input.value,
    )?;

    let assigned = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM product_attributes \
                        WHERE product_id = $1 AND attribute_definition_id = $2 \
                          AND deleted_at IS NULL)",
    )
    .bind(product_id)
    .bind(definition_id)
    .fetch_one(&mut *conn)
    .await?;
    if assigned {
        return Err(DbError::conflict(
            "Product already has this attribute assigned",
            codes::ATTRIBUTE_ALREADY_ASSIGNED,
        ));
    }

    if admission == Admission::Learned {
        learn_value(&mut *conn, definition_id, &input.value).await?;
    }

    let attribute_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO product_attributes (product_id, attribute_definition_id, value, sort_order) \
         VALUES ($1, $2, $3, COALESCE($4, 0)) \
         RETURNING id",
    )
    .bind(product_id)
    .bind(definition_id)
    .bind(&input.value)
    .bind(input.sort_order)
    .fetch_one(&mut *conn)
    .await?;

    get_product_attribute(&mut *conn, product_id, attribute_id)
        .await?
        .ok_or_else(|| DbError::Corrupt(format!("attribute {attribute_id} vanished after insert")))
}

/// Change the value (and optionally the sort order) of one attribute.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an inadmissible value and
/// [`DbError::NotFound`] when the product or attribute is not live.
pub async fn update_product_attribute(
    pool: &PgPool,
    product_id: i64,
    attribute_id: i64,
    patch: AttributePatch,
) -> Result<ProductAttributeRow, DbError> {
    patch.validate()?;

    let row = atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;
            update_attribute_in(conn, product_id, attribute_id, &patch)
                .await?
                .ok_or_else(|| DbError::not_found("attribute"))
        })
    })
    .await?;

    tracing::info!(product_id, attribute_id, "product attribute updated");
    Ok(row)
}

/// Apply attribute patches in list order inside one transaction and return
/// the updated rows. Unknown, deleted, or foreign ids are skipped.
///
/// # Errors
///
/// Returns [`DbError::Validation`] when the list is empty or any item is
/// invalid (including an inadmissible value), [`DbError::NotFound`] for a
/// repeated id or a missing product. Nothing is written in either case.
pub async fn bulk_update_product_attributes(
    pool: &PgPool,
    product_id: i64,
    items: Vec<BulkAttributePatch>,
) -> Result<Vec<ProductAttributeRow>, DbError> {
    validate_bulk_attribute_patches(&items)?;

    let rows = atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;
            let mut applied = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let updated = update_attribute_in(&mut *conn, product_id, item.id, &item.patch)
                    .await
                    .map_err(|e| match e {
                        DbError::Validation(v) => DbError::Validation(v.at_index(index)),
                        other => other,
                    })?;
                if let Some(row) = updated {
                    applied.push(row);
                }
            }
            Ok(applied)
        })
    })
    .await?;

    tracing::info!(product_id, updated = rows.len(), "product attributes bulk updated");
    Ok(rows)
}

async fn update_attribute_in(
    conn: &mut PgConnection,
    product_id: i64,
    attribute_id: i64,
    patch: &AttributePatch,
) -> Result<Option<ProductAttributeRow>, DbError> {
    let definition_id = sqlx::query_scalar::<_, i64>(
        "SELECT attribute_definition_id FROM product_attributes \
         WHERE id = $1 AND product_id = $2 AND deleted_at IS NULL \
         FOR UPDATE",
    )
    .bind(attribute_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(definition_id) = definition_id else {
        return Ok(None);
    };

    let definition = lock_definition(&mut *conn, definition_id).await?;
    let admission = admit_value(
        definition.data_type()?,
        definition.value_policy()?,
        &definition.allowed_values,
        &patch.value,
    )?;
    if admission == Admission::Learned {
        learn_value(&mut *conn, definition_id, &patch.value).await?;
    }

    sqlx::query(
        "UPDATE product_attributes \
         SET value = $2, sort_order = COALESCE($3, sort_order), updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(attribute_id)
    .bind(&patch.value)
    .bind(patch.sort_order)
    .execute(&mut *conn)
    .await?;

    get_product_attribute(conn, product_id, attribute_id).await
}

/// Append `value` to an open definition's list if it is not there yet.
async fn learn_value(
    conn: &mut PgConnection,
    definition_id: i64,
    value: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE attribute_definitions \
         SET allowed_values = array_append(allowed_values, $2), updated_at = NOW() \
         WHERE id = $1 AND NOT ($2 = ANY (allowed_values))",
    )
    .bind(definition_id)
    .bind(value)
    .execute(conn)
    .await?;
    Ok(())
}

/// Soft-delete one product attribute. A second delete reports `NotFound`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the product or attribute is not live.
pub async fn delete_product_attribute(
    pool: &PgPool,
    product_id: i64,
    attribute_id: i64,
) -> Result<(), DbError> {
    atomic(pool, move |conn| {
        Box::pin(async move {
            lock_product(&mut *conn, product_id).await?;
            let result = sqlx::query(
                "UPDATE product_attributes SET deleted_at = NOW(), updated_at = NOW() \
                 WHERE id = $1 AND product_id = $2 AND deleted_at IS NULL",
            )
            .bind(attribute_id)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found("attribute"));
            }
            Ok(())
        })
    })
    .await?;

    tracing::info!(product_id, attribute_id, "product attribute deleted");
    Ok(())
}

/// Switch a definition between `open` and `closed`. Existing allowed values
/// are kept, so closing freezes whatever the definition has learned so far.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id.
pub async fn set_definition_policy(
    pool: &PgPool,
    definition_id: i64,
    policy: ValuePolicy,
) -> Result<AttributeDefinitionRow, DbError> {
    let row = sqlx::query_as::<_, AttributeDefinitionRow>(
        "UPDATE attribute_definitions \
         SET value_policy = $2, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING id, key, name, unit, data_type, value_policy, \
                   allowed_values::text AS allowed_values, created_at, updated_at",
    )
    .bind(definition_id)
    .bind(policy.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("attribute definition"))?;

    tracing::info!(definition_id, policy = policy.as_str(), "attribute definition policy set");
    Ok(row)
}

/// Delete an attribute definition that no product attribute references.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id and
/// [`DbError::Integrity`] (`ATTRIBUTE_IN_USE`) when it is still referenced.
pub async fn delete_attribute_definition(pool: &PgPool, definition_id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM attribute_definitions WHERE id = $1")
        .bind(definition_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("attribute definition"));
    }

    tracing::info!(definition_id, "attribute definition deleted");
    Ok(())
}
