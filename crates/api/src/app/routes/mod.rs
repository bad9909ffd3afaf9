use axum::{routing::get, Router};

pub mod permissions;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/permissions", permissions::router())
        .nest("/users", users::router())
}
