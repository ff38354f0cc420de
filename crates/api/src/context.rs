use tallybook_auth::{GlobalRole, WorkspaceRole};
use tallybook_core::{UserId, WorkspaceId};

/// Authenticated identity for a request, derived from the bearer token.
///
/// Present on every protected route. `workspace_id` is whatever workspace
/// the client has selected; membership in it is not yet verified at this
/// stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    user_id: UserId,
    email: String,
    global_role: GlobalRole,
    workspace_id: Option<WorkspaceId>,
}

impl AuthContext {
    pub fn new(
        user_id: UserId,
        email: String,
        global_role: GlobalRole,
        workspace_id: Option<WorkspaceId>,
    ) -> Self {
        Self {
            user_id,
            email,
            global_role,
            workspace_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn global_role(&self) -> GlobalRole {
        self.global_role
    }

    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        self.workspace_id
    }
}

/// Verified workspace membership for a request.
///
/// Inserted by the workspace middleware after the membership row has been
/// found; workspace-scoped handlers can rely on it being present.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MembershipContext {
    membership_id: i64,
    user_id: UserId,
    workspace_id: WorkspaceId,
    role: WorkspaceRole,
}

impl MembershipContext {
    pub fn new(
        membership_id: i64,
        user_id: UserId,
        workspace_id: WorkspaceId,
        role: WorkspaceRole,
    ) -> Self {
        Self {
            membership_id,
            user_id,
            workspace_id,
            role,
        }
    }

    pub fn membership_id(&self) -> i64 {
        self.membership_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    pub fn role(&self) -> WorkspaceRole {
        self.role
    }
}
