//! Database operations for the `categories` table.

use chrono::{DateTime, Utc};
use shelf_core::{codes, CategoryRecord, NewCategory, ValidationError};
use sqlx::{PgExecutor, PgPool};

use crate::{atomic, DbError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        CategoryRecord {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
            description: row.description,
        }
    }
}

/// All categories, ordered by name.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn list_categories<'e>(executor: impl PgExecutor<'e>) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, parent_id, description, created_at, updated_at \
         FROM categories \
         ORDER BY name, id",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn get_category<'e>(
    executor: impl PgExecutor<'e>,
    category_id: i64,
) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, parent_id, description, created_at, updated_at \
         FROM categories \
         WHERE id = $1",
    )
    .bind(category_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Look up a category by name under `parent_id` (`None` for roots). Absence
/// is `Ok(None)`, not an error.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn find_category_by_name_and_parent<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
    parent_id: Option<i64>,
) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, parent_id, description, created_at, updated_at \
         FROM categories \
         WHERE name = $1 AND parent_id IS NOT DISTINCT FROM $2",
    )
    .bind(name)
    .bind(parent_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Create a category and return the inserted row.
///
/// # Errors
///
/// Returns [`DbError::Validation`] (`INVALID_PARENT_CATEGORY`) for an unknown
/// parent and [`DbError::Conflict`] when the name is taken under that parent.
pub async fn create_category(pool: &PgPool, input: NewCategory) -> Result<CategoryRow, DbError> {
    input.validate()?;

    let row = atomic(pool, move |conn| {
        Box::pin(async move {
            let name = input.name.trim();

            if let Some(parent_id) = input.parent_id {
                if get_category(&mut *conn, parent_id).await?.is_none() {
                    return Err(ValidationError::new("parentId", "parent category does not exist")
                        .with_code(codes::INVALID_PARENT_CATEGORY)
                        .into());
                }
            }

            if find_category_by_name_and_parent(&mut *conn, name, input.parent_id)
                .await?
                .is_some()
            {
                return Err(DbError::Conflict {
                    message: format!("category '{name}' already exists under this parent"),
                    code: None,
                });
            }

            let row = sqlx::query_as::<_, CategoryRow>(
                "INSERT INTO categories (name, parent_id, description) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, name, parent_id, description, created_at, updated_at",
            )
            .bind(name)
            .bind(input.parent_id)
            .bind(input.description.as_deref())
            .fetch_one(&mut *conn)
            .await?;

            Ok(row)
        })
    })
    .await?;

    tracing::info!(category_id = row.id, name = %row.name, "category created");
    Ok(row)
}

/// Delete a category that no product or child category references.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id and [`DbError::Integrity`]
/// (`CATEGORY_HAS_PRODUCTS` / `CATEGORY_HAS_CHILDREN`) when it is referenced.
pub async fn delete_category(pool: &PgPool, category_id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("category"));
    }

    tracing::info!(category_id, "category deleted");
    Ok(())
}
