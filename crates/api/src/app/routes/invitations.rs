use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use tallybook_auth::{Action, Permission, Resource, WorkspaceRole};

use crate::app::{errors, services::AppServices};
use crate::context::{AuthContext, MembershipContext};
use crate::guards;

/// Workspace-scoped management routes (create, list, revoke, resend).
pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invitation).get(list_invitations))
        .route("/:id/revoke", post(revoke_invitation))
        .route("/:id/resend", post(resend_invitation))
}

/// Token-based routes used by the invitee, who is typically not a member
/// yet. Authenticated, but no workspace selection required.
pub fn token_router() -> Router {
    Router::new()
        .route("/accept", post(accept_invitation))
        .route("/decline", post(decline_invitation))
}

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: WorkspaceRole,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

pub async fn create_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Json(body): Json<CreateInvitationRequest>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Invitations, Action::Create),
    ) {
        return resp;
    }
    match services
        .invitations
        .create(
            membership.workspace_id(),
            body.email,
            body.role,
            membership.user_id(),
            body.message,
        )
        .await
    {
        Ok(invitation) => (StatusCode::CREATED, Json(invitation)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn list_invitations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Invitations, Action::Read),
    ) {
        return resp;
    }
    match services.invitations.list(membership.workspace_id()).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn revoke_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Invitations, Action::Delete),
    ) {
        return resp;
    }
    match services
        .invitations
        .revoke(id, membership.user_id(), membership.workspace_id())
        .await
    {
        Ok(invitation) => (StatusCode::OK, Json(invitation)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn resend_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Invitations, Action::Update),
    ) {
        return resp;
    }
    match services
        .invitations
        .resend(id, membership.user_id(), membership.workspace_id())
        .await
    {
        Ok(invitation) => (StatusCode::OK, Json(invitation)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn accept_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<TokenRequest>,
) -> axum::response::Response {
    match services
        .invitations
        .accept(&body.token, auth.user_id(), auth.email())
        .await
    {
        Ok(membership) => (StatusCode::OK, Json(membership)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn decline_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<TokenRequest>,
) -> axum::response::Response {
    match services.invitations.decline(&body.token).await {
        Ok(invitation) => (StatusCode::OK, Json(invitation)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}
