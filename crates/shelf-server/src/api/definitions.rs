//! Attribute definition handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use shelf_core::{authorize_admin, Actor, DefinitionPolicyPatch};

use crate::middleware::RequestId;

use super::shape::{AttributeDefinitionView, CreatedId};
use super::{map_access_denied, map_db_error, parse_body, ApiError, ApiResponse, AppState};

pub(super) async fn list_definitions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<AttributeDefinitionView>>>, ApiError> {
    let rid = req_id.0.as_str();
    let rows = shelf_db::list_attribute_definitions(&state.pool)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Attribute definitions retrieved successfully",
        rows.into_iter().map(AttributeDefinitionView::from).collect(),
    ))
}

/// PUT /api/attribute-definitions/{definition_id}
///
/// Admin only. Opens or closes a definition; listed values are untouched.
pub(super) async fn update_definition_policy(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(definition_id): Path<i64>,
    body: Result<Json<DefinitionPolicyPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<AttributeDefinitionView>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_admin(&actor).map_err(|denied| map_access_denied(rid, denied))?;
    let patch = parse_body(rid, body)?;

    let row = shelf_db::set_definition_policy(&state.pool, definition_id, patch.value_policy)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Attribute definition updated successfully",
        row.into(),
    ))
}

/// DELETE /api/attribute-definitions/{definition_id}
///
/// Refused with 409 `ATTRIBUTE_IN_USE` while any product attribute, live or
/// deleted, still references the definition.
pub(super) async fn delete_definition(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(definition_id): Path<i64>,
) -> Result<Json<ApiResponse<CreatedId>>, ApiError> {
    let rid = req_id.0.as_str();
    authorize_admin(&actor).map_err(|denied| map_access_denied(rid, denied))?;

    shelf_db::delete_attribute_definition(&state.pool, definition_id)
        .await
        .map_err(|e| map_db_error(rid, e))?;

    Ok(ApiResponse::ok(
        &req_id,
        "Attribute definition deleted successfully",
        CreatedId { id: definition_id },
    ))
}
