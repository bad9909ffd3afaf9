use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use serde_json::json;

use gatekeeper_core::{PermissionId, UserId};

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/:user_id/permissions", get(list_user_permissions).post(assign_permission))
        .route("/:user_id/permissions/:permission_id", delete(revoke_permission))
}

/// GET /users/:user_id/permissions - grants, or an empty list while the store is down
pub async fn list_user_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user_id: UserId = match user_id.parse() {
        Ok(v) => v,
        Err(e) => return errors::access_error_to_response(e),
    };

    match services
        .permissions
        .list_user_permissions(principal.principal(), user_id)
        .await
    {
        Ok(listing) => {
            (StatusCode::OK, Json(dto::PermissionListResponse::from(listing))).into_response()
        }
        Err(e) => errors::access_error_to_response(e),
    }
}

/// POST /users/:user_id/permissions - grant one permission
pub async fn assign_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
    body: Result<Json<dto::AssignPermissionRequest>, JsonRejection>,
) -> axum::response::Response {
    let user_id: UserId = match user_id.parse() {
        Ok(v) => v,
        Err(e) => return errors::access_error_to_response(e),
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", rej.body_text()),
    };
    let permission_id = match body.permission_id.into_permission_id() {
        Ok(v) => v,
        Err(e) => return errors::access_error_to_response(e),
    };

    match services
        .permissions
        .assign(principal.principal(), user_id, permission_id)
        .await
    {
        Ok(grant) => (
            StatusCode::OK,
            Json(json!({
                "message": "permission assigned",
                "user_id": grant.user_id,
                "permission_id": grant.permission_id,
            })),
        )
            .into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}

/// DELETE /users/:user_id/permissions/:permission_id - revoke one grant
pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((user_id, permission_id)): Path<(String, String)>,
) -> axum::response::Response {
    let ids = user_id
        .parse::<UserId>()
        .and_then(|u| permission_id.parse::<PermissionId>().map(|p| (u, p)));
    let (user_id, permission_id) = match ids {
        Ok(v) => v,
        Err(e) => return errors::access_error_to_response(e),
    };

    match services
        .permissions
        .revoke(principal.principal(), user_id, permission_id)
        .await
    {
        Ok(grant) => (
            StatusCode::OK,
            Json(json!({
                "message": "permission revoked",
                "user_id": grant.user_id,
                "permission_id": grant.permission_id,
            })),
        )
            .into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}
