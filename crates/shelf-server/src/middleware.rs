use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shelf_core::{Actor, Role};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Header an unauthenticated caller uses to name the seller whose catalog it
/// is browsing.
pub const SELLER_HINT_HEADER: &str = "x-seller-id";

/// Bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    #[serde(default)]
    pub seller_id: Option<i64>,
    pub exp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    Invalid,
    Expired,
    NotAccepted,
}

impl TokenRejection {
    fn message(self) -> &'static str {
        match self {
            TokenRejection::Malformed => "authorization header must be 'Bearer <token>'",
            TokenRejection::Invalid => "invalid bearer token",
            TokenRejection::Expired => "bearer token has expired",
            TokenRejection::NotAccepted => "bearer tokens are not accepted by this server",
        }
    }
}

/// JWT verification settings used by [`resolve_actor`].
#[derive(Clone)]
pub struct AuthState {
    key: Option<Arc<DecodingKey>>,
    validation: Arc<Validation>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("enabled", &self.enabled())
            .finish_non_exhaustive()
    }
}

impl AuthState {
    /// Builds auth config from the HMAC secret, if any.
    ///
    /// Without a secret bearer tokens are refused and callers can only act
    /// as guests. Configuration loading refuses a missing secret outside
    /// development.
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        if secret.is_none() {
            tracing::warn!("SHELF_JWT_SECRET not set; bearer tokens will be rejected");
        }
        Self {
            key: secret.map(|s| Arc::new(DecodingKey::from_secret(s.as_bytes()))),
            validation: Arc::new(Validation::new(Algorithm::HS256)),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.key.is_some()
    }

    fn verify(&self, token: &str) -> Result<Actor, TokenRejection> {
        let key = self.key.as_ref().ok_or(TokenRejection::NotAccepted)?;
        let claims = decode::<Claims>(token, key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenRejection::Expired,
                _ => TokenRejection::Invalid,
            })?
            .claims;
        actor_from_claims(&claims)
    }
}

fn actor_from_claims(claims: &Claims) -> Result<Actor, TokenRejection> {
    match (claims.role, claims.seller_id) {
        (Role::Admin, _) => Ok(Actor::admin()),
        (Role::Customer, _) => Ok(Actor::customer()),
        (Role::Seller, Some(seller_id)) => Ok(Actor::seller(seller_id)),
        (Role::Seller, None) | (Role::Guest, _) => Err(TokenRejection::Invalid),
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter applied to mutating routes.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }

    #[must_use]
    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone())
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Resolve the caller into an [`Actor`] request extension.
///
/// A bearer token must verify or the request is rejected with 401. Without
/// an `Authorization` header the caller is a guest, carrying the
/// `X-Seller-ID` header (if it parses) as its seller hint.
pub async fn resolve_actor(State(auth): State<AuthState>, mut req: Request, next: Next) -> Response {
    let actor = match req.headers().get(AUTHORIZATION) {
        Some(value) => {
            let verified = extract_bearer_token(Some(value))
                .ok_or(TokenRejection::Malformed)
                .and_then(|token| auth.verify(token));
            match verified {
                Ok(actor) => actor,
                Err(rejection) => {
                    tracing::debug!(?rejection, "bearer token rejected");
                    return ApiError::new(
                        request_id_of(&req),
                        StatusCode::UNAUTHORIZED,
                        rejection.message(),
                    )
                    .into_response();
                }
            }
        }
        None => Actor::guest(seller_hint(req.headers())),
    };

    req.extensions_mut().insert(actor);
    next.run(req).await
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        return ApiError::new(
            request_id_of(&req),
            StatusCode::TOO_MANY_REQUESTS,
            "rate limit exceeded",
        )
        .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

fn seller_hint(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(SELLER_HINT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
