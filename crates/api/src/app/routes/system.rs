use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Liveness plus store reachability. Always 200: a down store means degraded, not dead.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let store = services.permissions.store_health().await;
    let status = if store.up { "ok" } else { "degraded" };
    (StatusCode::OK, Json(json!({ "status": status, "store": store })))
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    Json(json!({
        "user_id": principal.user_id(),
        "role": principal.role().as_str(),
        "is_admin": services.permissions.policy().is_admin(principal.principal()),
    }))
}
