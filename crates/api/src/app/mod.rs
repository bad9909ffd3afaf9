//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and permission service wiring
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use gatekeeper_auth::{Gate, Hs256TokenVerifier};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(jwt_secret: String, services: services::AppServices) -> Router {
    let verifier = Arc::new(Hs256TokenVerifier::new(jwt_secret.into_bytes()));
    let gate = Gate::new(verifier);
    let auth_state = middleware::AuthState { gate };

    let services = Arc::new(services);

    // Protected routes: require a valid bearer token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id_middleware))
                .layer(Extension(services)),
        )
}
