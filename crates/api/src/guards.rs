//! Per-handler authorization guards.
//!
//! Two deliberately separate checks: workspace guards consult the membership
//! role against the `entity:action` matrix; global guards consult the
//! account-wide role. They answer different questions and are never mixed.

use axum::response::Response;

use tallybook_auth::{role_has_permission, GlobalRole, Permission, WorkspaceRole};
use tallybook_core::DomainError;

use crate::app::errors;
use crate::context::{AuthContext, MembershipContext};

/// The membership's role must grant `permission`, else `FORBIDDEN`.
pub fn require_permission(
    membership: &MembershipContext,
    permission: Permission,
) -> Result<(), Response> {
    if role_has_permission(membership.role(), permission) {
        Ok(())
    } else {
        Err(errors::domain_error_response(&DomainError::forbidden(
            format!("{} requires the {permission} permission", membership.role()),
        )))
    }
}

/// The membership's role must be in `allowed`, else `FORBIDDEN`.
pub fn require_role(
    membership: &MembershipContext,
    allowed: &[WorkspaceRole],
) -> Result<(), Response> {
    if allowed.contains(&membership.role()) {
        Ok(())
    } else {
        Err(errors::domain_error_response(&DomainError::forbidden(
            format!("route not available to the {} role", membership.role()),
        )))
    }
}

pub fn require_owner(membership: &MembershipContext) -> Result<(), Response> {
    require_role(membership, &[WorkspaceRole::Owner])
}

pub fn require_admin(membership: &MembershipContext) -> Result<(), Response> {
    require_role(membership, &[WorkspaceRole::Owner, WorkspaceRole::Admin])
}

pub fn require_editor(membership: &MembershipContext) -> Result<(), Response> {
    require_role(
        membership,
        &[
            WorkspaceRole::Owner,
            WorkspaceRole::Admin,
            WorkspaceRole::Editor,
        ],
    )
}

/// The account-wide role must grant `permission`, else `FORBIDDEN`.
pub fn require_global_permission(
    auth: &AuthContext,
    permission: Permission,
) -> Result<(), Response> {
    if auth.global_role().allows(permission) {
        Ok(())
    } else {
        Err(errors::domain_error_response(&DomainError::forbidden(
            format!(
                "{} accounts lack the {permission} permission",
                auth.global_role()
            ),
        )))
    }
}

/// The account-wide role must be in `allowed`, else `FORBIDDEN`.
pub fn require_global_role(auth: &AuthContext, allowed: &[GlobalRole]) -> Result<(), Response> {
    if allowed.contains(&auth.global_role()) {
        Ok(())
    } else {
        Err(errors::domain_error_response(&DomainError::forbidden(
            format!("route not available to {} accounts", auth.global_role()),
        )))
    }
}
