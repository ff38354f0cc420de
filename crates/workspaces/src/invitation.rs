//! Workspace invitations: invite by email, accept by token.
//!
//! An invitation moves from `pending` to exactly one terminal status
//! (accepted, declined, revoked, or expired). Expiry is applied lazily when
//! a token is presented and periodically by a sweep.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

use tallybook_auth::{can_manage_role, WorkspaceRole};
use tallybook_core::{DomainError, DomainResult, UserId, WorkspaceId};
use tallybook_store::{
    decode_text_column, MemoryRecord, MemoryRepository, PgQueryAs, PgRecord, PgRepository, Record,
    Repository,
};

use crate::membership::{CreateMembership, Membership, MembershipStore};

/// Days a fresh (or resent) invitation stays valid.
pub const INVITATION_TTL_DAYS: i64 = 7;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Revoked,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != Self::Pending
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvitationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            other => Err(DomainError::validation(format!(
                "unknown invitation status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub id: i64,
    pub workspace_id: WorkspaceId,
    pub email: String,
    pub role: WorkspaceRole,
    pub status: InvitationStatus,
    /// Opaque 256-bit token, hex-encoded. Never logged.
    pub token: String,
    pub message: Option<String>,
    pub invited_by: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
pub struct CreateInvitation {
    pub workspace_id: WorkspaceId,
    pub email: String,
    pub role: WorkspaceRole,
    pub token: String,
    pub message: Option<String>,
    pub invited_by: UserId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateInvitation {
    pub status: Option<InvitationStatus>,
    pub token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Record for Invitation {
    const TABLE: &'static str = "invitations";
    type Create = CreateInvitation;
    type Update = UpdateInvitation;

    fn id(&self) -> i64 {
        self.id
    }
}

impl MemoryRecord for Invitation {
    fn from_create(id: i64, created_at: DateTime<Utc>, input: &Self::Create) -> Self {
        Self {
            id,
            workspace_id: input.workspace_id,
            email: input.email.clone(),
            role: input.role,
            status: InvitationStatus::Pending,
            token: input.token.clone(),
            message: input.message.clone(),
            invited_by: input.invited_by,
            created_at,
            expires_at: input.expires_at,
        }
    }

    fn apply_update(&mut self, input: &Self::Update) {
        if let Some(status) = input.status {
            self.status = status;
        }
        if let Some(token) = &input.token {
            self.token = token.clone();
        }
        if let Some(expires_at) = input.expires_at {
            self.expires_at = expires_at;
        }
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Invitation {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: WorkspaceId::new(row.try_get("workspace_id")?),
            email: row.try_get("email")?,
            role: decode_text_column(row, "role")?,
            status: decode_text_column(row, "status")?,
            token: row.try_get("token")?,
            message: row.try_get("message")?,
            invited_by: UserId::new(row.try_get("invited_by")?),
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl PgRecord for Invitation {
    const INSERT_COLUMNS: &'static [&'static str] = &[
        "workspace_id",
        "email",
        "role",
        "status",
        "token",
        "message",
        "invited_by",
        "expires_at",
    ];

    fn bind_insert<'q>(query: PgQueryAs<'q, Self>, input: &'q Self::Create) -> PgQueryAs<'q, Self> {
        query
            .bind(input.workspace_id.as_i64())
            .bind(&input.email)
            .bind(input.role.as_str())
            .bind(InvitationStatus::Pending.as_str())
            .bind(&input.token)
            .bind(&input.message)
            .bind(input.invited_by.as_i64())
            .bind(input.expires_at)
    }

    fn update_columns(input: &Self::Update) -> Vec<&'static str> {
        let mut columns = Vec::new();
        if input.status.is_some() {
            columns.push("status");
        }
        if input.token.is_some() {
            columns.push("token");
        }
        if input.expires_at.is_some() {
            columns.push("expires_at");
        }
        columns
    }

    fn bind_update<'q>(
        mut query: PgQueryAs<'q, Self>,
        input: &'q Self::Update,
    ) -> PgQueryAs<'q, Self> {
        if let Some(status) = input.status {
            query = query.bind(status.as_str());
        }
        if let Some(token) = &input.token {
            query = query.bind(token);
        }
        if let Some(expires_at) = input.expires_at {
            query = query.bind(expires_at);
        }
        query
    }
}

/// Invitation queries beyond the generic contract.
#[async_trait]
pub trait InvitationStore: Repository<Invitation> + Send + Sync {
    async fn find_by_token(&self, token: &str) -> DomainResult<Option<Invitation>>;

    /// Pending invitation for this (workspace, email), if any. Used to
    /// reject duplicate invites.
    async fn find_pending(
        &self,
        workspace: WorkspaceId,
        email: &str,
    ) -> DomainResult<Option<Invitation>>;

    async fn find_by_workspace(&self, workspace: WorkspaceId) -> DomainResult<Vec<Invitation>>;

    /// Pending invitations whose expiry has passed as of `now`.
    async fn find_expired_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Invitation>>;
}

#[async_trait]
impl InvitationStore for MemoryRepository<Invitation> {
    async fn find_by_token(&self, token: &str) -> DomainResult<Option<Invitation>> {
        Ok(self.filter(|i| i.token == token)?.into_iter().next())
    }

    async fn find_pending(
        &self,
        workspace: WorkspaceId,
        email: &str,
    ) -> DomainResult<Option<Invitation>> {
        Ok(self
            .filter(|i| {
                i.workspace_id == workspace
                    && i.status == InvitationStatus::Pending
                    && i.email.eq_ignore_ascii_case(email)
            })?
            .into_iter()
            .next())
    }

    async fn find_by_workspace(&self, workspace: WorkspaceId) -> DomainResult<Vec<Invitation>> {
        self.filter(|i| i.workspace_id == workspace)
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Invitation>> {
        self.filter(|i| i.is_expired_at(now))
    }
}

#[async_trait]
impl InvitationStore for PgRepository<Invitation> {
    async fn find_by_token(&self, token: &str) -> DomainResult<Option<Invitation>> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE token = $1")
            .bind(token)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| DomainError::database("find_by_token", e.to_string()))
    }

    async fn find_pending(
        &self,
        workspace: WorkspaceId,
        email: &str,
    ) -> DomainResult<Option<Invitation>> {
        sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations \
             WHERE workspace_id = $1 AND lower(email) = lower($2) AND status = 'pending'",
        )
        .bind(workspace.as_i64())
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| DomainError::database("find_pending", e.to_string()))
    }

    async fn find_by_workspace(&self, workspace: WorkspaceId) -> DomainResult<Vec<Invitation>> {
        sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations WHERE workspace_id = $1 ORDER BY id DESC",
        )
        .bind(workspace.as_i64())
        .fetch_all(self.pool())
        .await
        .map_err(|e| DomainError::database("find_by_workspace", e.to_string()))
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Invitation>> {
        sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations WHERE status = 'pending' AND expires_at <= $1",
        )
        .bind(now)
        .fetch_all(self.pool())
        .await
        .map_err(|e| DomainError::database("find_expired_pending", e.to_string()))
    }
}

/// Outbound notification seam. The API wires a mail sender here; tests and
/// dev use the tracing sink.
#[async_trait]
pub trait InvitationNotifier: Send + Sync {
    async fn invitation_sent(&self, invitation: &Invitation);
}

/// Default notifier: records the event in the log stream only.
pub struct TracingNotifier;

#[async_trait]
impl InvitationNotifier for TracingNotifier {
    async fn invitation_sent(&self, invitation: &Invitation) {
        tracing::info!(
            invitation_id = invitation.id,
            workspace_id = invitation.workspace_id.as_i64(),
            email = %invitation.email,
            role = %invitation.role,
            "invitation notification"
        );
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn validate_email(email: &str) -> DomainResult<()> {
    let ok = email.contains('@') && !email.starts_with('@') && !email.ends_with('@');
    if !ok {
        return Err(DomainError::validation_field("invalid email address", "email"));
    }
    Ok(())
}

/// The invite → accept/decline/revoke/expire workflow.
pub struct InvitationService {
    invitations: Arc<dyn InvitationStore>,
    memberships: Arc<dyn MembershipStore>,
    notifier: Arc<dyn InvitationNotifier>,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationStore>,
        memberships: Arc<dyn MembershipStore>,
        notifier: Arc<dyn InvitationNotifier>,
    ) -> Self {
        Self {
            invitations,
            memberships,
            notifier,
        }
    }

    pub async fn list(&self, workspace: WorkspaceId) -> DomainResult<Vec<Invitation>> {
        self.invitations.find_by_workspace(workspace).await
    }

    /// Invite `email` into the workspace with `role`. Ownership is never
    /// granted by invitation; a duplicate pending invite is a conflict.
    pub async fn create(
        &self,
        workspace: WorkspaceId,
        email: String,
        role: WorkspaceRole,
        invited_by: UserId,
        message: Option<String>,
    ) -> DomainResult<Invitation> {
        validate_email(&email)?;
        if role == WorkspaceRole::Owner {
            return Err(DomainError::validation_field(
                "ownership cannot be granted by invitation",
                "role",
            ));
        }
        if self
            .invitations
            .find_pending(workspace, &email)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(format!(
                "a pending invitation for {email} already exists"
            )));
        }

        let invitation = self
            .invitations
            .create(CreateInvitation {
                workspace_id: workspace,
                email,
                role,
                token: generate_token(),
                message,
                invited_by,
                expires_at: Utc::now() + Duration::days(INVITATION_TTL_DAYS),
            })
            .await?;

        self.notifier.invitation_sent(&invitation).await;
        tracing::info!(
            invitation_id = invitation.id,
            workspace_id = workspace.as_i64(),
            role = %invitation.role,
            "invitation created"
        );
        Ok(invitation)
    }

    /// Resolve a token to its pending invitation, expiring it lazily if the
    /// deadline has passed.
    async fn pending_by_token(&self, token: &str) -> DomainResult<Invitation> {
        let invitation = self
            .invitations
            .find_by_token(token)
            .await?
            .ok_or_else(|| DomainError::not_found("invitation", "token"))?;

        if invitation.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "invitation has already been {}",
                invitation.status
            )));
        }
        if invitation.is_expired_at(Utc::now()) {
            self.invitations
                .update(
                    invitation.id,
                    UpdateInvitation {
                        status: Some(InvitationStatus::Expired),
                        ..Default::default()
                    },
                )
                .await?;
            return Err(DomainError::conflict("invitation has expired"));
        }
        Ok(invitation)
    }

    /// Accept an invitation: verifies the accepting user's email matches,
    /// creates the membership, and marks the invitation accepted.
    pub async fn accept(
        &self,
        token: &str,
        user: UserId,
        user_email: &str,
    ) -> DomainResult<Membership> {
        let invitation = self.pending_by_token(token).await?;

        if !invitation.email.eq_ignore_ascii_case(user_email) {
            return Err(DomainError::forbidden(
                "invitation was issued to a different email address",
            ));
        }
        if self
            .memberships
            .find_by_user_and_workspace(user, invitation.workspace_id)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(
                "user is already a member of this workspace",
            ));
        }

        let membership = self
            .memberships
            .create(CreateMembership {
                workspace_id: invitation.workspace_id,
                user_id: user,
                role: invitation.role,
            })
            .await?;
        self.invitations
            .update(
                invitation.id,
                UpdateInvitation {
                    status: Some(InvitationStatus::Accepted),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            invitation_id = invitation.id,
            workspace_id = invitation.workspace_id.as_i64(),
            user_id = %user,
            role = %invitation.role,
            "invitation accepted"
        );
        Ok(membership)
    }

    pub async fn decline(&self, token: &str) -> DomainResult<Invitation> {
        let invitation = self.pending_by_token(token).await?;
        self.invitations
            .update(
                invitation.id,
                UpdateInvitation {
                    status: Some(InvitationStatus::Declined),
                    ..Default::default()
                },
            )
            .await
    }

    /// Revoke a pending invitation. The requester must be able to manage
    /// the role the invitation would grant.
    pub async fn revoke(
        &self,
        id: i64,
        requester: UserId,
        workspace: WorkspaceId,
    ) -> DomainResult<Invitation> {
        let invitation = self.managed_invitation(id, requester, workspace).await?;
        self.invitations
            .update(
                invitation.id,
                UpdateInvitation {
                    status: Some(InvitationStatus::Revoked),
                    ..Default::default()
                },
            )
            .await
    }

    /// Re-issue a pending invitation with a fresh token and expiry, and
    /// notify again.
    pub async fn resend(
        &self,
        id: i64,
        requester: UserId,
        workspace: WorkspaceId,
    ) -> DomainResult<Invitation> {
        let invitation = self.managed_invitation(id, requester, workspace).await?;
        let refreshed = self
            .invitations
            .update(
                invitation.id,
                UpdateInvitation {
                    token: Some(generate_token()),
                    expires_at: Some(Utc::now() + Duration::days(INVITATION_TTL_DAYS)),
                    ..Default::default()
                },
            )
            .await?;
        self.notifier.invitation_sent(&refreshed).await;
        Ok(refreshed)
    }

    async fn managed_invitation(
        &self,
        id: i64,
        requester: UserId,
        workspace: WorkspaceId,
    ) -> DomainResult<Invitation> {
        let invitation = self.invitations.find_by_id_or_fail(id).await?;
        if invitation.workspace_id != workspace {
            return Err(DomainError::not_found("invitation", id));
        }
        if invitation.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "invitation has already been {}",
                invitation.status
            )));
        }

        let requester_membership = self
            .memberships
            .find_by_user_and_workspace(requester, workspace)
            .await?
            .ok_or_else(|| DomainError::forbidden("not a member of this workspace"))?;
        if !can_manage_role(requester_membership.role, invitation.role) {
            return Err(DomainError::forbidden(format!(
                "{} cannot manage an invitation for the {} role",
                requester_membership.role, invitation.role
            )));
        }
        Ok(invitation)
    }

    /// Sweep: mark every overdue pending invitation expired. Returns how
    /// many were transitioned.
    pub async fn expire_old_invitations(&self) -> DomainResult<u64> {
        let now = Utc::now();
        let overdue = self.invitations.find_expired_pending(now).await?;
        let mut expired = 0u64;
        for invitation in overdue {
            self.invitations
                .update(
                    invitation.id,
                    UpdateInvitation {
                        status: Some(InvitationStatus::Expired),
                        ..Default::default()
                    },
                )
                .await?;
            expired += 1;
        }
        if expired > 0 {
            tracing::info!(count = expired, "expired stale invitations");
        }
        Ok(expired)
    }
}
