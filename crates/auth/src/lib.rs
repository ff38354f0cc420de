//! `tallybook-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. It holds two
//! deliberately separate permission systems:
//!
//! - [`workspace`]: the per-workspace membership role model (owner/admin/
//!   editor/viewer) with its static role→permission matrix. Answers "what may
//!   this member do *inside this workspace*?"
//! - [`global`]: the coarse per-account role model (admin/user/readonly).
//!   Answers "what may this account do *at all*?"
//!
//! The two are not compatible and nothing here converts between them.

pub mod claims;
pub mod global;
pub mod workspace;

pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use global::GlobalRole;
pub use workspace::{
    Action, Permission, Resource, WorkspaceRole, can_manage_role, highest_role, is_role_higher,
    is_role_higher_or_equal, role_has_permission, role_permissions,
};
