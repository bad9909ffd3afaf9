use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_catalog).post(define_permission))
}

/// GET /permissions - catalog, or the built-in reference set while the store is down
pub async fn list_catalog(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.permissions.list_catalog(principal.principal()).await {
        Ok(listing) => {
            (StatusCode::OK, Json(dto::PermissionListResponse::from(listing))).into_response()
        }
        Err(e) => errors::access_error_to_response(e),
    }
}

/// POST /permissions - define a catalog entry
pub async fn define_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::DefinePermissionRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", rej.body_text()),
    };

    match services
        .permissions
        .define_catalog_entry(principal.principal(), &body.permission_name, &body.description)
        .await
    {
        Ok(permission) => (StatusCode::CREATED, Json(permission)).into_response(),
        Err(e) => errors::access_error_to_response(e),
    }
}
