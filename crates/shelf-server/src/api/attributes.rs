//! Product attribute handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use shelf_core::{Actor, AttributePatch, BulkAttributePatch, NewProductAttribute};

use crate::middleware::RequestId;

use super::shape::{AttributeView, BulkUpdateView, CreatedId};
use super::{
    authorize_product, map_db_error, parse_body, Access, ApiError, ApiResponse, AppState,
};

/// GET /api/products/{product_id}/attributes
pub(super) async fn list_attributes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<AttributeView>>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Read).await?;

    let rows = shelf_db::list_product_attributes(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Attributes retrieved successfully",
        rows.into_iter().map(AttributeView::from).collect(),
    ))
}

/// POST /api/products/{product_id}/attributes
pub(super) async fn set_attribute(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
    body: Result<Json<NewProductAttribute>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AttributeView>>), ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;
    let input = parse_body(rid, body)?;

    let row = shelf_db::set_product_attribute(&state.pool, product_id, input)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(&req_id, "Attribute added successfully", row.into()),
    ))
}

/// PUT /api/products/{product_id}/attributes/{attribute_id}
pub(super) async fn update_attribute(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path((product_id, attribute_id)): Path<(i64, i64)>,
    body: Result<Json<AttributePatch>, JsonRejection>,
) -> Result<Json<ApiResponse<AttributeView>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;
    let patch = parse_body(rid, body)?;

    let row = shelf_db::update_product_attribute(&state.pool, product_id, attribute_id, patch)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Attribute updated successfully",
        row.into(),
    ))
}

/// PUT /api/products/{product_id}/attributes/bulk
pub(super) async fn bulk_update_attributes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
    body: Result<Json<Vec<BulkAttributePatch>>, JsonRejection>,
) -> Result<Json<ApiResponse<BulkUpdateView<AttributeView>>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;
    let items = parse_body(rid, body)?;

    let rows = shelf_db::bulk_update_product_attributes(&state.pool, product_id, items)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Attributes updated successfully",
        BulkUpdateView::new(rows.into_iter().map(AttributeView::from).collect()),
    ))
}

/// DELETE /api/products/{product_id}/attributes/{attribute_id}
pub(super) async fn delete_attribute(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path((product_id, attribute_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<CreatedId>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;

    shelf_db::delete_product_attribute(&state.pool, product_id, attribute_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Attribute deleted successfully",
        CreatedId { id: attribute_id },
    ))
}
