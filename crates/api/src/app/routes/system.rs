use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::{AuthContext, MembershipContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(auth): Extension<AuthContext>,
    membership: Option<Extension<MembershipContext>>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": auth.user_id(),
        "email": auth.email(),
        "global_role": auth.global_role().as_str(),
        "workspace_id": auth.workspace_id(),
        "membership_role": membership.map(|m| m.role().as_str()),
    }))
}
