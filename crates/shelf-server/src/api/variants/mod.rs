//! Variant handlers. Reads live in `read`, mutations in `write`.

mod read;
mod write;

pub(super) use read::{find_variant, get_variant, list_variants};
pub(super) use write::{bulk_update_variants, create_variant, delete_variant, update_variant};

use axum::http::StatusCode;

use super::shape::VariantView;
use super::{map_db_error, ApiError, AppState};

/// Load a variant with its product summary and selected options, or 404.
async fn load_variant_view(
    state: &AppState,
    req_id: &str,
    product_id: i64,
    variant_id: i64,
) -> Result<VariantView, ApiError> {
    shelf_db::get_variant_detail(&state.pool, product_id, variant_id)
        .await
        .map_err(|e| map_db_error(req_id, e))?
        .map(VariantView::from)
        .ok_or_else(|| ApiError::new(req_id, StatusCode::NOT_FOUND, "variant not found"))
}
