//! Account-admin maintenance surface, gated by the *global* role model
//! rather than workspace membership.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tallybook_auth::{role_permissions, Action, GlobalRole, Permission, Resource, WorkspaceRole};

use crate::app::{errors, services::AppServices};
use crate::context::AuthContext;
use crate::guards;

pub fn router() -> Router {
    Router::new()
        .route("/invitations/expire", post(expire_invitations))
        .route("/roles", get(list_roles))
}

/// Sweep pending invitations past their expiry. The global role must allow
/// invitation deletion, which only admin accounts do.
pub async fn expire_invitations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_global_permission(
        &auth,
        Permission::new(Resource::Invitations, Action::Delete),
    ) {
        return resp;
    }
    match services.invitations.expire_old_invitations().await {
        Ok(expired) => {
            (StatusCode::OK, Json(serde_json::json!({ "expired": expired }))).into_response()
        }
        Err(e) => errors::domain_error_response(&e),
    }
}

/// The workspace role→permission matrix, for "why was I denied?" debugging.
pub async fn list_roles(Extension(auth): Extension<AuthContext>) -> axum::response::Response {
    if let Err(resp) = guards::require_global_role(&auth, &[GlobalRole::Admin]) {
        return resp;
    }

    let roles: Vec<_> = WorkspaceRole::ALL
        .iter()
        .map(|role| {
            serde_json::json!({
                "role": role.as_str(),
                "rank": role.rank(),
                "permissions": role_permissions(*role)
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response()
}
