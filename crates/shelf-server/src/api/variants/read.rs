use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use shelf_core::Actor;

use crate::middleware::RequestId;

use super::super::shape::VariantView;
use super::super::{authorize_product, map_db_error, Access, ApiError, ApiResponse, AppState};
use super::load_variant_view;

/// GET /api/products/{product_id}/variants
pub(in crate::api) async fn list_variants(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<VariantView>>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Read).await?;

    let rows = shelf_db::list_variants(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;
    let details = shelf_db::list_variant_details(&state.pool, product_id, rows, state.batch)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Variants retrieved successfully",
        details.into_iter().map(VariantView::from).collect(),
    ))
}

/// GET /api/products/{product_id}/variants/{variant_id}
pub(in crate::api) async fn get_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path((product_id, variant_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<VariantView>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Read).await?;

    let view = load_variant_view(&state, rid, product_id, variant_id).await?;
    Ok(ApiResponse::ok(&req_id, "Variant retrieved successfully", view))
}

/// GET /api/products/{product_id}/variants/find?Size=M&Color=Black
///
/// Every query parameter is an option selection; names that are not options
/// of the product are rejected.
pub(in crate::api) async fn find_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
    Query(selection): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<VariantView>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Read).await?;

    let variant = shelf_db::find_variant_by_options(&state.pool, product_id, &selection)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    let view = load_variant_view(&state, rid, product_id, variant.id).await?;
    Ok(ApiResponse::ok(&req_id, "Variant found", view))
}
