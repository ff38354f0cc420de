//! HTTP application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: store backends behind each domain service
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(jwt_secret: String) -> Router {
    let services = Arc::new(services::build_in_memory_services());
    build_app_with_services(jwt_secret, services)
}

pub fn build_app_with_services(jwt_secret: String, services: Arc<services::AppServices>) -> Router {
    let jwt = Arc::new(tallybook_auth::Hs256JwtValidator::new(
        jwt_secret.into_bytes(),
    ));
    let auth_state = middleware::AuthState { jwt };
    let membership_state = middleware::MembershipState {
        memberships: services.membership_store.clone(),
    };

    // Workspace-scoped routes additionally require a resolved membership.
    let workspace_scoped = routes::workspace_router().layer(axum::middleware::from_fn_with_state(
        membership_state,
        middleware::workspace_middleware,
    ));

    // Authenticated routes that work without a selected workspace:
    // creating/listing workspaces, token-based invitation responses, admin.
    let protected = routes::router()
        .nest("/workspace", workspace_scoped)
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
