mod attributes;
mod categories;
mod definitions;
mod options;
mod products;
mod shape;
mod variants;

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shelf_core::{authorize_mutate, authorize_read, AccessDenied, Actor, ErrorKind, ValidationError};
use shelf_db::{BatchConfig, DbError};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, resolve_actor, AuthState, RateLimitState, RequestId,
    SELLER_HINT_HEADER,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub batch: BatchConfig,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn ok(request_id: &RequestId, message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
            meta: ResponseMeta::new(request_id.0.clone()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ResponseMeta {
    pub(crate) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    pub meta: ResponseMeta,
}

impl ApiError {
    pub fn new(request_id: impl Into<String>, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            message: message.into(),
            code: None,
            errors: None,
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: Option<&str>) -> Self {
        self.code = code.map(str::to_owned);
        self
    }

    pub(crate) fn from_kind(
        request_id: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::new(request_id, status_for(kind), message)
    }

    pub(crate) fn validation(request_id: impl Into<String>, error: &ValidationError) -> Self {
        let mut api_error = Self::new(request_id, StatusCode::BAD_REQUEST, error.to_string())
            .with_code(error.code);
        api_error.errors = Some(vec![FieldError {
            field: error.field.clone(),
            message: error.message.clone(),
        }]);
        api_error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self)).into_response()
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::Integrity => StatusCode::CONFLICT,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(super) fn map_db_error(request_id: &str, error: DbError) -> ApiError {
    match error.kind() {
        ErrorKind::ValidationFailed => match error {
            DbError::Validation(ref v) => ApiError::validation(request_id, v),
            other => ApiError::from_kind(request_id, ErrorKind::ValidationFailed, other.to_string()),
        },
        ErrorKind::Transient => {
            tracing::warn!(error = %error, "transient database failure");
            ApiError::from_kind(
                request_id,
                ErrorKind::Transient,
                "database temporarily unavailable; retry the request",
            )
        }
        ErrorKind::Internal => {
            tracing::error!(error = %error, "database query failed");
            ApiError::from_kind(request_id, ErrorKind::Internal, "database query failed")
        }
        kind => ApiError::from_kind(request_id, kind, error.to_string()).with_code(error.code()),
    }
}

pub(super) fn map_access_denied(request_id: &str, denied: AccessDenied) -> ApiError {
    ApiError::from_kind(request_id, denied.kind(), denied.to_string())
}

/// Unwrap a JSON body, turning extractor rejections into the error envelope.
pub(super) fn parse_body<T>(
    request_id: &str,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ApiError::new(request_id, StatusCode::BAD_REQUEST, rejection.body_text())
    })
}

/// Ownership gate shared by every product-scoped handler.
#[derive(Debug, Clone, Copy)]
pub(super) enum Access {
    Read,
    Mutate,
}

/// Resolve the product's owner and check `actor` against it. Returns the
/// owner's seller id.
pub(super) async fn authorize_product(
    state: &AppState,
    request_id: &str,
    actor: &Actor,
    product_id: i64,
    access: Access,
) -> Result<i64, ApiError> {
    // Guests are refused before any lookup, so anonymous callers cannot
    // probe for product ids.
    if let Access::Mutate = access {
        if !actor.is_authenticated() {
            return Err(map_access_denied(request_id, AccessDenied::Unauthorized));
        }
    }

    let owner = shelf_db::get_product_owner(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(request_id, e))?
        .ok_or_else(|| ApiError::new(request_id, StatusCode::NOT_FOUND, "product not found"))?;

    let verdict = match access {
        Access::Read => authorize_read(actor, owner),
        Access::Mutate => authorize_mutate(actor, owner),
    };
    verdict.map_err(|denied| map_access_denied(request_id, denied))?;
    Ok(owner)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(SELLER_HINT_HEADER),
        ])
}

fn read_router() -> Router<AppState> {
    Router::new()
        .route("/api/products/{product_id}", get(products::get_product))
        .route(
            "/api/products/{product_id}/options",
            get(options::list_options),
        )
        .route(
            "/api/products/{product_id}/variants",
            get(variants::list_variants),
        )
        .route(
            "/api/products/{product_id}/variants/find",
            get(variants::find_variant),
        )
        .route(
            "/api/products/{product_id}/variants/{variant_id}",
            get(variants::get_variant),
        )
        .route(
            "/api/products/{product_id}/attributes",
            get(attributes::list_attributes),
        )
        .route("/api/categories", get(categories::list_categories))
        .route(
            "/api/attribute-definitions",
            get(definitions::list_definitions),
        )
}

fn write_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/products", post(products::create_product))
        .route("/api/products/{product_id}", delete(products::delete_product))
        .route(
            "/api/products/{product_id}/options",
            post(options::create_option),
        )
        .route(
            "/api/products/{product_id}/options/{option_id}/values",
            post(options::create_option_value),
        )
        .route(
            "/api/products/{product_id}/variants",
            post(variants::create_variant),
        )
        .route(
            "/api/products/{product_id}/variants/bulk",
            put(variants::bulk_update_variants),
        )
        .route(
            "/api/products/{product_id}/variants/{variant_id}",
            put(variants::update_variant).delete(variants::delete_variant),
        )
        .route(
            "/api/products/{product_id}/attributes",
            post(attributes::set_attribute),
        )
        .route(
            "/api/products/{product_id}/attributes/bulk",
            put(attributes::bulk_update_attributes),
        )
        .route(
            "/api/products/{product_id}/attributes/{attribute_id}",
            put(attributes::update_attribute).delete(attributes::delete_attribute),
        )
        .route("/api/categories", post(categories::create_category))
        .route(
            "/api/categories/{category_id}",
            delete(categories::delete_category),
        )
        .route(
            "/api/attribute-definitions/{definition_id}",
            put(definitions::update_definition_policy).delete(definitions::delete_definition),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(
    state: AppState,
    auth: AuthState,
    rate_limit: RateLimitState,
    request_timeout: Duration,
) -> Router {
    let public_routes = Router::new().route("/api/health", get(health));

    let catalog_routes = Router::new()
        .merge(read_router())
        .merge(write_router(rate_limit))
        .layer(axum::middleware::from_fn_with_state(auth, resolve_actor));

    Router::new()
        .merge(public_routes)
        .merge(catalog_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match shelf_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            ApiResponse::ok(
                &req_id,
                "ok",
                HealthData {
                    status: "ok",
                    database: "ok",
                },
            ),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            let mut body = ApiResponse::ok(
                &req_id,
                "database unavailable",
                HealthData {
                    status: "degraded",
                    database: "unavailable",
                },
            );
            body.0.success = false;
            (StatusCode::SERVICE_UNAVAILABLE, body)
        }
    }
}
