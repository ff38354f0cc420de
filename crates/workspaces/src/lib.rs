//! `tallybook-workspaces` — workspaces, memberships, and invitations.
//!
//! A workspace is the tenant boundary; each user holds exactly one
//! membership role per workspace. New members arrive through the invitation
//! workflow (invite by email, accept by token) or by creating a workspace,
//! which makes the creator its owner.

pub mod invitation;
pub mod membership;
pub mod workspace;

pub use invitation::{
    CreateInvitation, Invitation, InvitationNotifier, InvitationService, InvitationStatus,
    InvitationStore, TracingNotifier, UpdateInvitation, INVITATION_TTL_DAYS,
};
pub use membership::{
    CreateMembership, Membership, MembershipService, MembershipStore, UpdateMembership,
};
pub use workspace::{
    CreateWorkspace, UpdateWorkspace, Workspace, WorkspaceService, WorkspaceStore,
};
