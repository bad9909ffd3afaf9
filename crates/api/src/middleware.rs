use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use gatekeeper_auth::Gate;
use gatekeeper_core::AccessError;

use crate::app::errors;
use crate::context::PrincipalContext;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AuthState {
    pub gate: Gate,
}

/// Resolve the bearer credential to a principal, or reject with 401.
///
/// Role checks happen later, per operation, in the permission service.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let principal = match state.gate.authenticate(extract_bearer(req.headers()), Utc::now()) {
        Ok(p) => p,
        Err(e) => return errors::access_error_to_response(AccessError::from(e)),
    };

    req.extensions_mut().insert(PrincipalContext::new(principal));
    next.run(req).await
}

/// Tag the request with a correlation id (caller-supplied or UUIDv7) and run
/// it inside a span carrying that id.
pub async fn request_id_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut res = next.run(req).instrument(span.clone()).await;
    span.in_scope(|| tracing::debug!(status = res.status().as_u16(), "request completed"));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
