//! Category handlers. Listing is public; creation and deletion are admin-only.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use shelf_core::{authorize_admin, build_tree, Actor, CategoryNode, CategoryRecord, NewCategory};

use crate::middleware::RequestId;

use super::shape::{CategoryView, CreatedId};
use super::{map_access_denied, map_db_error, parse_body, ApiError, ApiResponse, AppState};

/// GET /api/categories
///
/// Returns the roots with `children` attached recursively.
pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CategoryNode>>>, ApiError> {
    let rid = req_id.0.as_str();
    let rows = shelf_db::list_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    let tree = build_tree(rows.into_iter().map(CategoryRecord::from).collect());
    Ok(ApiResponse::ok(&req_id, "Categories retrieved successfully", tree))
}

/// POST /api/categories
pub(super) async fn create_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryView>>), ApiError> {
    let rid = req_id.0.as_str();
    authorize_admin(&actor).map_err(|denied| map_access_denied(rid, denied))?;
    let input = parse_body(rid, body)?;

    let row = shelf_db::create_category(&state.pool, input)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(&req_id, "Category created successfully", row.into()),
    ))
}

/// DELETE /api/categories/{category_id}
pub(super) async fn delete_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(category_id): Path<i64>,
) -> Result<Json<ApiResponse<CreatedId>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_admin(&actor).map_err(|denied| map_access_denied(rid, denied))?;

    shelf_db::delete_category(&state.pool, category_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Category deleted successfully",
        CreatedId { id: category_id },
    ))
}
