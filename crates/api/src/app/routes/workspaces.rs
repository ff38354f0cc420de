use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use tallybook_auth::{Action, Permission, Resource};
use tallybook_workspaces::{CreateWorkspace, UpdateWorkspace};

use crate::app::{errors, services::AppServices};
use crate::context::{AuthContext, MembershipContext};
use crate::guards;

/// Routes that do not require a selected workspace.
pub fn router() -> Router {
    Router::new().route("/", post(create_workspace).get(list_workspaces))
}

/// Routes acting on the selected workspace (behind membership middleware).
pub fn current_router() -> Router {
    Router::new().route(
        "/",
        get(get_current).patch(update_current).delete(delete_current),
    )
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

pub async fn create_workspace(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateWorkspaceRequest>,
) -> axum::response::Response {
    match services
        .workspaces
        .create(
            auth.user_id(),
            CreateWorkspace {
                name: body.name,
                slug: body.slug,
                description: body.description,
            },
        )
        .await
    {
        Ok(workspace) => (StatusCode::CREATED, Json(workspace)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn list_workspaces(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
) -> axum::response::Response {
    match services.workspaces.list_for_user(auth.user_id()).await {
        Ok(items) => {
            let items: Vec<_> = items
                .into_iter()
                .map(|(workspace, role)| {
                    serde_json::json!({
                        "workspace": workspace,
                        "role": role.as_str(),
                    })
                })
                .collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn get_current(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Workspace, Action::Read),
    ) {
        return resp;
    }
    match services.workspaces.get(membership.workspace_id()).await {
        Ok(workspace) => (StatusCode::OK, Json(workspace)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn update_current(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Json(body): Json<UpdateWorkspace>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Workspace, Action::Update),
    ) {
        return resp;
    }
    match services
        .workspaces
        .update(membership.workspace_id(), body)
        .await
    {
        Ok(workspace) => (StatusCode::OK, Json(workspace)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn delete_current(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_owner(&membership) {
        return resp;
    }
    match services.workspaces.delete(membership.workspace_id()).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}
