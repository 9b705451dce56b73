//! Product handlers: create, read with option schema, soft delete.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use shelf_core::{AccessDenied, Actor, NewProduct, Role};

use crate::middleware::RequestId;

use super::shape::{option_views, CreatedId, ProductView};
use super::{
    authorize_product, map_access_denied, map_db_error, parse_body, Access, ApiError, ApiResponse,
    AppState,
};

/// Decide which seller owns a product being created.
fn owning_seller(actor: &Actor, requested: Option<i64>) -> Result<i64, OwnerError> {
    match actor.role {
        Role::Guest => Err(OwnerError::Denied(AccessDenied::Unauthorized)),
        Role::Customer => Err(OwnerError::Denied(AccessDenied::Forbidden)),
        Role::Seller => match (actor.seller_id, requested) {
            (Some(own), Some(other)) if own != other => {
                Err(OwnerError::Denied(AccessDenied::Forbidden))
            }
            (Some(own), _) => Ok(own),
            (None, _) => Err(OwnerError::Denied(AccessDenied::Forbidden)),
        },
        Role::Admin => requested.ok_or(OwnerError::MissingSeller),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum OwnerError {
    Denied(AccessDenied),
    MissingSeller,
}

/// POST /api/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ProductView>>), ApiError> {
    let rid = req_id.0.as_str();
    let input = parse_body(rid, body)?;

    let seller_id = owning_seller(&actor, input.seller_id).map_err(|e| match e {
        OwnerError::Denied(denied) => map_access_denied(rid, denied),
        OwnerError::MissingSeller => ApiError::validation(
            rid,
            &shelf_core::ValidationError::new("sellerId", "sellerId is required for admins"),
        ),
    })?;

    let row = shelf_db::create_product(&state.pool, seller_id, input)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    let product_id = row.id;
    let options = shelf_db::list_options(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;
    let values = shelf_db::list_values_for_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            &req_id,
            "Product created successfully",
            ProductView::new(row, option_views(options, values), None),
        ),
    ))
}

/// GET /api/products/{product_id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<ProductView>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Read).await?;

    let row = shelf_db::get_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?
        .ok_or_else(|| ApiError::new(rid, StatusCode::NOT_FOUND, "product not found"))?;
    let options = shelf_db::list_options(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;
    let values = shelf_db::list_values_for_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;
    let default_variant_id = shelf_db::default_variant_id(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Product retrieved successfully",
        ProductView::new(row, option_views(options, values), default_variant_id),
    ))
}

/// DELETE /api/products/{product_id}
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<CreatedId>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_product(&state, rid, &actor, product_id, Access::Mutate).await?;

    shelf_db::delete_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Product deleted successfully",
        CreatedId { id: product_id },
    ))
}
