//! Variant write handlers: create, update, bulk update, delete.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use shelf_core::{Actor, BulkVariantPatch, NewVariant, VariantInput, VariantPatch};

use crate::middleware::RequestId;

use super::super::shape::{BulkUpdateView, CreatedId, VariantView};
use super::super::{
    authorize_product, map_db_error, parse_body, Access, ApiError, ApiResponse, AppState,
};
use super::load_variant_view;

/// POST /api/products/{product_id}/variants
pub(in crate::api) async fn create_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
    body: Result<Json<VariantInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<VariantView>>), ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;

    let input = NewVariant::try_from(parse_body(rid, body)?)
        .map_err(|e| ApiError::validation(rid, &e))?;

    let variant_id = shelf_db::create_variant(&state.pool, product_id, input)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    let view = load_variant_view(&state, rid, product_id, variant_id).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(&req_id, "Variant created successfully", view),
    ))
}

/// PUT /api/products/{product_id}/variants/{variant_id}
pub(in crate::api) async fn update_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path((product_id, variant_id)): Path<(i64, i64)>,
    body: Result<Json<VariantPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<VariantView>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;
    let patch = parse_body(rid, body)?;

    shelf_db::update_variant(&state.pool, product_id, variant_id, patch)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    let view = load_variant_view(&state, rid, product_id, variant_id).await?;
    Ok(ApiResponse::ok(&req_id, "Variant updated successfully", view))
}

/// PUT /api/products/{product_id}/variants/bulk
///
/// Items naming unknown or foreign variants are skipped; `updatedCount`
/// counts only the rows that changed.
pub(in crate::api) async fn bulk_update_variants(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
    body: Result<Json<Vec<BulkVariantPatch>>, JsonRejection>,
) -> Result<Json<ApiResponse<BulkUpdateView<VariantView>>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;
    let items = parse_body(rid, body)?;

    let applied = shelf_db::bulk_update_variants(&state.pool, product_id, items)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    let rows = shelf_db::list_variants_by_ids(&state.pool, product_id, &applied)
        .await
        .map_err(|e| map_db_error(rid, e))?;
    let details = shelf_db::list_variant_details(&state.pool, product_id, rows, state.batch)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Variants updated successfully",
        BulkUpdateView::new(details.into_iter().map(VariantView::from).collect()),
    ))
}

/// DELETE /api/products/{product_id}/variants/{variant_id}
pub(in crate::api) async fn delete_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path((product_id, variant_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<CreatedId>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;

    shelf_db::delete_variant(&state.pool, product_id, variant_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Variant deleted successfully",
        CreatedId { id: variant_id },
    ))
}
