use axum::{routing::get, Router};

pub mod accounts;
pub mod admin;
pub mod categories;
pub mod invitations;
pub mod members;
pub mod system;
pub mod workspaces;

/// Router for authenticated endpoints that do not need a selected workspace.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/workspaces", workspaces::router())
        .nest("/invitations", invitations::token_router())
        .nest("/admin", admin::router())
}

/// Router for endpoints scoped to the selected workspace. Mounted under
/// `/workspace` behind the membership middleware.
pub fn workspace_router() -> Router {
    Router::new()
        .merge(workspaces::current_router())
        .nest("/categories", categories::router())
        .nest("/accounts", accounts::router())
        .nest("/members", members::router())
        .nest("/invitations", invitations::router())
}
