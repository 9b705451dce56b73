use std::{env, time::Duration};

use futures::future::BoxFuture;
use shelf_core::{codes, ErrorKind, RuleViolation, ValidationError};
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};
use thiserror::Error;

pub mod attributes;
pub mod batch;
pub mod categories;
pub mod options;
pub mod products;
pub mod text_array;
pub mod variants;

pub use attributes::{
    bulk_update_product_attributes, delete_attribute_definition, delete_product_attribute,
    get_attribute_definition_by_key, get_product_attribute, list_attribute_definitions,
    list_product_attributes, set_definition_policy, set_product_attribute,
    update_product_attribute, AttributeDefinitionRow, ProductAttributeRow,
};
pub use batch::{fetch_chunked, preload_selected_options, BatchConfig};
pub use categories::{
    create_category, delete_category, find_category_by_name_and_parent, get_category,
    list_categories, CategoryRow,
};
pub use options::{
    define_option, define_value, list_options, list_values, list_values_for_product, load_schema,
    OptionRow, OptionValueRow,
};
pub use products::{
    create_product, delete_product, get_product, get_product_owner, lock_product, ProductRow,
};
pub use text_array::{decode_text_array, encode_text_array, ArrayCodecError, TextArray};
pub use variants::{
    bulk_update_variants, create_variant, default_variant_id, delete_variant,
    find_variant_by_options, get_product_summary, get_variant, get_variant_detail,
    list_selected_options, list_variant_details, list_variants, list_variants_by_ids,
    load_combinations, update_variant, ProductSummaryRow, SelectedOptionRow, VariantDetail,
    VariantRow,
};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/shelf-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &shelf_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    /// Names the missing entity, e.g. `"product"` or `"option 'Size'"`.
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{message}")]
    Conflict {
        message: String,
        code: Option<&'static str>,
    },
    #[error("{message}")]
    Integrity {
        message: String,
        code: Option<&'static str>,
    },
    #[error("transient database failure: {0}")]
    Transient(#[source] sqlx::Error),
    #[error("stored data is inconsistent: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Sqlx(sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Codec(#[from] text_array::ArrayCodecError),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        DbError::NotFound(entity.into())
    }

    pub fn conflict(message: impl Into<String>, code: &'static str) -> Self {
        DbError::Conflict {
            message: message.into(),
            code: Some(code),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound(_) => ErrorKind::NotFound,
            DbError::Validation(_) => ErrorKind::ValidationFailed,
            DbError::Conflict { .. } => ErrorKind::Conflict,
            DbError::Integrity { .. } => ErrorKind::Integrity,
            DbError::Transient(_) => ErrorKind::Transient,
            DbError::MissingDatabaseUrl
            | DbError::Corrupt(_)
            | DbError::Sqlx(_)
            | DbError::Migration(_)
            | DbError::Codec(_) => ErrorKind::Internal,
        }
    }

    /// Machine code for documented cases, if any.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            DbError::Validation(e) => e.code,
            DbError::Conflict { code, .. } | DbError::Integrity { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        let mut transient = matches!(
            error,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
        );
        if let sqlx::Error::RowNotFound = error {
            return DbError::not_found("record");
        }
        if let sqlx::Error::Database(db_err) = &error {
            let constraint = db_err.constraint().unwrap_or_default();
            let sqlstate = db_err.code().map(std::borrow::Cow::into_owned);
            match sqlstate.as_deref() {
                Some("23505") => return classify_unique_violation(constraint),
                Some("23503" | "23502" | "23514") => {
                    return classify_integrity_violation(constraint, db_err.message());
                }
                Some("40001" | "40P01") => transient = true,
                _ => {}
            }
        }
        if transient {
            DbError::Transient(error)
        } else {
            DbError::Sqlx(error)
        }
    }
}

impl From<RuleViolation> for DbError {
    fn from(violation: RuleViolation) -> Self {
        match violation {
            RuleViolation::Invalid(e) => DbError::Validation(e),
            RuleViolation::NotFound(entity) => DbError::NotFound(entity),
            RuleViolation::Conflict(message) => DbError::Conflict {
                message,
                code: None,
            },
        }
    }
}

fn classify_unique_violation(constraint: &str) -> DbError {
    match constraint {
        "products_sku_live_key" => {
            DbError::conflict("a product with this SKU already exists", codes::PRODUCT_EXISTS)
        }
        "product_attributes_live_key" => DbError::conflict(
            "Product already has this attribute assigned",
            codes::ATTRIBUTE_ALREADY_ASSIGNED,
        ),
        "product_variants_single_default_key" => DbError::Conflict {
            message: "product already has a default variant".to_string(),
            code: None,
        },
        "categories_name_parent_key" | "categories_root_name_key" => DbError::Conflict {
            message: "a category with this name already exists under the parent".to_string(),
            code: None,
        },
        other => DbError::Conflict {
            message: format!("unique constraint violated: {other}"),
            code: None,
        },
    }
}

fn classify_integrity_violation(constraint: &str, message: &str) -> DbError {
    let (message, code) = match constraint {
        "products_category_id_fkey" => (
            "category is referenced by products".to_string(),
            Some(codes::CATEGORY_HAS_PRODUCTS),
        ),
        "categories_parent_id_fkey" => (
            "category has child categories".to_string(),
            Some(codes::CATEGORY_HAS_CHILDREN),
        ),
        "product_attributes_attribute_definition_id_fkey" => (
            "attribute definition is referenced by products".to_string(),
            Some(codes::ATTRIBUTE_IN_USE),
        ),
        _ => (message.to_string(), None),
    };
    DbError::Integrity { message, code }
}

/// Run `work` inside a single transaction: commit on `Ok`, roll back on
/// `Err`.
///
/// Every multi-statement write goes through here. If the returned future is
/// dropped before completion (client disconnect, request timeout) the
/// transaction is dropped with it and sqlx rolls it back.
///
/// `work` receives the transaction's connection and must own whatever else
/// it captures:
///
/// ```ignore
/// atomic(pool, move |conn| Box::pin(async move { do_things(conn, &input).await }))
/// ```
///
/// # Errors
///
/// Returns whatever `work` returns, or [`DbError`] if the transaction cannot
/// be opened or committed.
pub async fn atomic<T, F>(pool: &PgPool, work: F) -> Result<T, DbError>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, DbError>> + Send,
{
    let mut tx = pool.begin().await?;
    match work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::warn!(error = %rollback_error, "transaction rollback failed");
            }
            Err(error)
        }
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to a Postgres pool, reading `DATABASE_URL` from env and using
/// default pool settings.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if `DATABASE_URL` is unset, or
/// a classified [`DbError`] if the connection cannot be established.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;
    connect_pool(&database_url, PoolConfig::default())
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table may not exist yet on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn row_not_found_maps_to_not_found_kind() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pool_timeout_is_transient() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn known_constraints_carry_codes() {
        let err = classify_unique_violation("products_sku_live_key");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.code(), Some(codes::PRODUCT_EXISTS));

        let err = classify_integrity_violation("products_category_id_fkey", "raw");
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.code(), Some(codes::CATEGORY_HAS_PRODUCTS));

        let err = classify_integrity_violation("something_else", "raw message");
        assert_eq!(err.to_string(), "raw message");
        assert_eq!(err.code(), None);
    }

    #[test]
    fn rule_violations_keep_their_kind() {
        let err = DbError::from(RuleViolation::NotFound("option 'Size'".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "option 'Size' not found");

        let err = DbError::from(RuleViolation::from(ValidationError::new("price", "bad")));
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }
}
