//! Option handlers: list a product's options and define options or values.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use shelf_core::{Actor, NewOption, NewOptionValue};

use crate::middleware::RequestId;

use super::shape::{option_views, CreatedId, OptionView};
use super::{
    authorize_product, map_db_error, parse_body, Access, ApiError, ApiResponse, AppState,
};

pub(super) async fn list_options(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<OptionView>>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Read).await?;

    let options = shelf_db::list_options(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;
    let values = shelf_db::list_values_for_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Options retrieved successfully",
        option_views(options, values),
    ))
}

/// POST /api/products/{product_id}/options
///
/// Defining an option that already exists returns its id unchanged.
pub(super) async fn create_option(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
    body: Result<Json<NewOption>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedId>>), ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;
    let input = parse_body(rid, body)?;

    let id = shelf_db::define_option(&state.pool, product_id, input)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(&req_id, "Option defined successfully", CreatedId { id }),
    ))
}

/// POST /api/products/{product_id}/options/{option_id}/values
pub(super) async fn create_option_value(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path((product_id, option_id)): Path<(i64, i64)>,
    body: Result<Json<NewOptionValue>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedId>>), ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;
    let input = parse_body(rid, body)?;

    let id = shelf_db::define_value(&state.pool, product_id, option_id, input)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(&req_id, "Option value defined successfully", CreatedId { id }),
    ))
}
