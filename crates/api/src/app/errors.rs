use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use gatekeeper_core::AccessError;

/// Map the access taxonomy onto HTTP.
///
/// Conflicts are 400: callers of the permission endpoints treat a duplicate
/// grant or name as a bad request.
pub fn access_error_to_response(err: AccessError) -> axum::response::Response {
    let code = err.code();
    match err {
        AccessError::Unauthenticated(msg) => json_error(StatusCode::UNAUTHORIZED, code, msg),
        AccessError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, code, msg),
        AccessError::NotFound(kind) => json_error(StatusCode::NOT_FOUND, code, format!("{kind} not found")),
        e @ AccessError::Conflict(_) => json_error(StatusCode::BAD_REQUEST, code, e.to_string()),
        AccessError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        AccessError::ServiceUnavailable(msg) => {
            tracing::warn!(error = %msg, "request failed: store unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                code,
                "permission store is unavailable, try again later",
            )
        }
        AccessError::Internal(msg) => {
            tracing::error!(error = %msg, "request failed: internal error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, code, "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
