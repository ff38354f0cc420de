use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use tallybook_auth::JwtValidator;
use tallybook_core::DomainError;
use tallybook_workspaces::MembershipStore;

use crate::app::errors;
use crate::context::{AuthContext, MembershipContext};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Stage 1: bearer token → [`AuthContext`], or `UNAUTHORIZED`.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        errors::domain_error_response(&DomainError::unauthorized(e.to_string()))
    })?;

    req.extensions_mut().insert(AuthContext::new(
        claims.sub,
        claims.email.clone(),
        claims.global_role,
        claims.workspace_id,
    ));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let missing =
        || errors::domain_error_response(&DomainError::unauthorized("missing bearer token"));

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(missing)?;
    let header = header.to_str().map_err(|_| missing())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(missing)?.trim();
    if token.is_empty() {
        return Err(missing());
    }
    Ok(token)
}

#[derive(Clone)]
pub struct MembershipState {
    pub memberships: Arc<dyn MembershipStore>,
}

/// Stage 2: resolve the selected workspace's membership row.
///
/// No selected workspace (or no auth context) is `UNAUTHORIZED`; an
/// authenticated user without a membership in the selected workspace is
/// `FORBIDDEN`.
pub async fn workspace_middleware(
    State(state): State<MembershipState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| {
            errors::domain_error_response(&DomainError::unauthorized("not authenticated"))
        })?;

    let workspace_id = auth.workspace_id().ok_or_else(|| {
        errors::domain_error_response(&DomainError::unauthorized("no workspace selected"))
    })?;

    let membership = state
        .memberships
        .find_by_user_and_workspace(auth.user_id(), workspace_id)
        .await
        .map_err(|e| errors::domain_error_response(&e))?
        .ok_or_else(|| {
            errors::domain_error_response(&DomainError::forbidden(
                "not a member of the selected workspace",
            ))
        })?;

    req.extensions_mut().insert(MembershipContext::new(
        membership.id,
        membership.user_id,
        membership.workspace_id,
        membership.role,
    ));

    Ok(next.run(req).await)
}
