use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch},
    Json, Router,
};
use serde::Deserialize;

use tallybook_auth::{Action, Permission, Resource, WorkspaceRole};

use crate::app::{errors, services::AppServices};
use crate::context::MembershipContext;
use crate::guards;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_members))
        .route("/:id/role", patch(change_role))
        .route("/:id", delete(remove_member))
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: WorkspaceRole,
}

pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Members, Action::Read),
    ) {
        return resp;
    }
    match services.members.list(membership.workspace_id()).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

/// Role changes are gated twice: the admin guard here, then the rank
/// comparison inside the service (only an owner may touch an owner).
pub async fn change_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
    Json(body): Json<ChangeRoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_admin(&membership) {
        return resp;
    }
    match services
        .members
        .change_role(membership.workspace_id(), membership.user_id(), id, body.role)
        .await
    {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    // members may always remove themselves; the service decides
    if id != membership.membership_id() {
        if let Err(resp) = guards::require_permission(
            &membership,
            Permission::new(Resource::Members, Action::Delete),
        ) {
            return resp;
        }
    }
    match services
        .members
        .remove_member(membership.workspace_id(), membership.user_id(), id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}
