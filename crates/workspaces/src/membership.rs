//! Memberships: one role per (user, workspace) pair.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use tallybook_auth::{can_manage_role, WorkspaceRole};
use tallybook_core::{DomainError, DomainResult, UserId, WorkspaceId};
use tallybook_store::{
    decode_text_column, MemoryRecord, MemoryRepository, PgQueryAs, PgRecord, PgRepository, Record,
    Repository,
};

#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub id: i64,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: WorkspaceRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: WorkspaceRole,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMembership {
    pub role: Option<WorkspaceRole>,
}

impl Record for Membership {
    const TABLE: &'static str = "memberships";
    type Create = CreateMembership;
    type Update = UpdateMembership;

    fn id(&self) -> i64 {
        self.id
    }
}

impl MemoryRecord for Membership {
    fn from_create(id: i64, created_at: DateTime<Utc>, input: &Self::Create) -> Self {
        Self {
            id,
            workspace_id: input.workspace_id,
            user_id: input.user_id,
            role: input.role,
            created_at,
        }
    }

    fn apply_update(&mut self, input: &Self::Update) {
        if let Some(role) = input.role {
            self.role = role;
        }
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Membership {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: WorkspaceId::new(row.try_get("workspace_id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            role: decode_text_column(row, "role")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl PgRecord for Membership {
    const INSERT_COLUMNS: &'static [&'static str] = &["workspace_id", "user_id", "role"];

    fn bind_insert<'q>(query: PgQueryAs<'q, Self>, input: &'q Self::Create) -> PgQueryAs<'q, Self> {
        query
            .bind(input.workspace_id.as_i64())
            .bind(input.user_id.as_i64())
            .bind(input.role.as_str())
    }

    fn update_columns(input: &Self::Update) -> Vec<&'static str> {
        if input.role.is_some() { vec!["role"] } else { Vec::new() }
    }

    fn bind_update<'q>(
        mut query: PgQueryAs<'q, Self>,
        input: &'q Self::Update,
    ) -> PgQueryAs<'q, Self> {
        if let Some(role) = input.role {
            query = query.bind(role.as_str());
        }
        query
    }
}

/// Membership queries beyond the generic contract.
#[async_trait]
pub trait MembershipStore: Repository<Membership> + Send + Sync {
    async fn find_by_user_and_workspace(
        &self,
        user: UserId,
        workspace: WorkspaceId,
    ) -> DomainResult<Option<Membership>>;

    async fn find_by_workspace(&self, workspace: WorkspaceId) -> DomainResult<Vec<Membership>>;

    async fn find_by_user(&self, user: UserId) -> DomainResult<Vec<Membership>>;

    async fn count_by_role(
        &self,
        workspace: WorkspaceId,
        role: WorkspaceRole,
    ) -> DomainResult<u64>;
}

#[async_trait]
impl MembershipStore for MemoryRepository<Membership> {
    async fn find_by_user_and_workspace(
        &self,
        user: UserId,
        workspace: WorkspaceId,
    ) -> DomainResult<Option<Membership>> {
        Ok(self
            .filter(|m| m.user_id == user && m.workspace_id == workspace)?
            .into_iter()
            .next())
    }

    async fn find_by_workspace(&self, workspace: WorkspaceId) -> DomainResult<Vec<Membership>> {
        self.filter(|m| m.workspace_id == workspace)
    }

    async fn find_by_user(&self, user: UserId) -> DomainResult<Vec<Membership>> {
        self.filter(|m| m.user_id == user)
    }

    async fn count_by_role(
        &self,
        workspace: WorkspaceId,
        role: WorkspaceRole,
    ) -> DomainResult<u64> {
        Ok(self
            .filter(|m| m.workspace_id == workspace && m.role == role)?
            .len() as u64)
    }
}

#[async_trait]
impl MembershipStore for PgRepository<Membership> {
    async fn find_by_user_and_workspace(
        &self,
        user: UserId,
        workspace: WorkspaceId,
    ) -> DomainResult<Option<Membership>> {
        sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE user_id = $1 AND workspace_id = $2",
        )
        .bind(user.as_i64())
        .bind(workspace.as_i64())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| DomainError::database("find_by_user_and_workspace", e.to_string()))
    }

    async fn find_by_workspace(&self, workspace: WorkspaceId) -> DomainResult<Vec<Membership>> {
        sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE workspace_id = $1 ORDER BY id",
        )
        .bind(workspace.as_i64())
        .fetch_all(self.pool())
        .await
        .map_err(|e| DomainError::database("find_by_workspace", e.to_string()))
    }

    async fn find_by_user(&self, user: UserId) -> DomainResult<Vec<Membership>> {
        sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE user_id = $1 ORDER BY id")
            .bind(user.as_i64())
            .fetch_all(self.pool())
            .await
            .map_err(|e| DomainError::database("find_by_user", e.to_string()))
    }

    async fn count_by_role(
        &self,
        workspace: WorkspaceId,
        role: WorkspaceRole,
    ) -> DomainResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM memberships WHERE workspace_id = $1 AND role = $2",
        )
        .bind(workspace.as_i64())
        .bind(role.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(|e| DomainError::database("count_by_role", e.to_string()))?;
        Ok(count as u64)
    }
}

/// Member administration: role changes and removals, both gated by the
/// requester's rank over the target.
pub struct MembershipService {
    memberships: Arc<dyn MembershipStore>,
}

impl MembershipService {
    pub fn new(memberships: Arc<dyn MembershipStore>) -> Self {
        Self { memberships }
    }

    pub async fn list(&self, workspace: WorkspaceId) -> DomainResult<Vec<Membership>> {
        self.memberships.find_by_workspace(workspace).await
    }

    pub async fn membership_of(
        &self,
        user: UserId,
        workspace: WorkspaceId,
    ) -> DomainResult<Option<Membership>> {
        self.memberships
            .find_by_user_and_workspace(user, workspace)
            .await
    }

    async fn require_membership(
        &self,
        user: UserId,
        workspace: WorkspaceId,
    ) -> DomainResult<Membership> {
        self.memberships
            .find_by_user_and_workspace(user, workspace)
            .await?
            .ok_or_else(|| DomainError::forbidden("not a member of this workspace"))
    }

    /// Change a member's role. The requester must outrank the target's
    /// current role and the role being assigned; only an owner may touch
    /// another owner. A workspace must keep at least one owner.
    pub async fn change_role(
        &self,
        workspace: WorkspaceId,
        requester: UserId,
        membership_id: i64,
        new_role: WorkspaceRole,
    ) -> DomainResult<Membership> {
        let requester_membership = self.require_membership(requester, workspace).await?;
        let target = self.memberships.find_by_id_or_fail(membership_id).await?;
        if target.workspace_id != workspace {
            return Err(DomainError::not_found("membership", membership_id));
        }

        if !can_manage_role(requester_membership.role, target.role) {
            return Err(DomainError::forbidden(format!(
                "{} cannot manage a {}",
                requester_membership.role, target.role
            )));
        }
        if !can_manage_role(requester_membership.role, new_role)
            && requester_membership.role != new_role
        {
            return Err(DomainError::forbidden(format!(
                "{} cannot assign the {} role",
                requester_membership.role, new_role
            )));
        }

        if target.role == WorkspaceRole::Owner && new_role != WorkspaceRole::Owner {
            self.ensure_not_last_owner(workspace).await?;
        }

        let updated = self
            .memberships
            .update(
                membership_id,
                UpdateMembership {
                    role: Some(new_role),
                },
            )
            .await?;
        tracing::info!(
            workspace_id = workspace.as_i64(),
            membership_id,
            role = %new_role,
            "membership role changed"
        );
        Ok(updated)
    }

    /// Remove a member. Members may always remove themselves; removing
    /// someone else requires outranking them. The last owner cannot leave.
    pub async fn remove_member(
        &self,
        workspace: WorkspaceId,
        requester: UserId,
        membership_id: i64,
    ) -> DomainResult<()> {
        let requester_membership = self.require_membership(requester, workspace).await?;
        let target = self.memberships.find_by_id_or_fail(membership_id).await?;
        if target.workspace_id != workspace {
            return Err(DomainError::not_found("membership", membership_id));
        }

        let leaving_self = target.user_id == requester;
        if !leaving_self && !can_manage_role(requester_membership.role, target.role) {
            return Err(DomainError::forbidden(format!(
                "{} cannot remove a {}",
                requester_membership.role, target.role
            )));
        }
        if target.role == WorkspaceRole::Owner {
            self.ensure_not_last_owner(workspace).await?;
        }

        self.memberships.delete(membership_id).await?;
        tracing::info!(
            workspace_id = workspace.as_i64(),
            membership_id,
            "membership removed"
        );
        Ok(())
    }

    async fn ensure_not_last_owner(&self, workspace: WorkspaceId) -> DomainResult<()> {
        let owners = self
            .memberships
            .count_by_role(workspace, WorkspaceRole::Owner)
            .await?;
        if owners <= 1 {
            return Err(DomainError::conflict(
                "a workspace must keep at least one owner",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MembershipService, Arc<MemoryRepository<Membership>>, WorkspaceId) {
        let store = Arc::new(MemoryRepository::new("membership"));
        let ws = WorkspaceId::new(1);
        for (user, role) in [
            (1, WorkspaceRole::Owner),
            (2, WorkspaceRole::Admin),
            (3, WorkspaceRole::Editor),
            (4, WorkspaceRole::Viewer),
        ] {
            store
                .create(CreateMembership {
                    workspace_id: ws,
                    user_id: UserId::new(user),
                    role,
                })
                .await
                .unwrap();
        }
        (MembershipService::new(store.clone()), store, ws)
    }

    #[tokio::test]
    async fn admin_can_demote_editor() {
        let (svc, _, ws) = seeded().await;
        let updated = svc
            .change_role(ws, UserId::new(2), 3, WorkspaceRole::Viewer)
            .await
            .unwrap();
        assert_eq!(updated.role, WorkspaceRole::Viewer);
    }

    #[tokio::test]
    async fn admin_cannot_touch_owner() {
        let (svc, _, ws) = seeded().await;
        let err = svc
            .change_role(ws, UserId::new(2), 1, WorkspaceRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn editor_cannot_remove_admin() {
        let (svc, _, ws) = seeded().await;
        let err = svc.remove_member(ws, UserId::new(3), 2).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn member_can_leave() {
        let (svc, store, ws) = seeded().await;
        svc.remove_member(ws, UserId::new(4), 4).await.unwrap();
        assert!(store
            .find_by_user_and_workspace(UserId::new(4), ws)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn last_owner_cannot_be_demoted_or_removed() {
        let (svc, _, ws) = seeded().await;
        let err = svc
            .change_role(ws, UserId::new(1), 1, WorkspaceRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = svc.remove_member(ws, UserId::new(1), 1).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn owner_can_transfer_ownership() {
        let (svc, store, ws) = seeded().await;
        svc.change_role(ws, UserId::new(1), 2, WorkspaceRole::Owner)
            .await
            .unwrap();
        // with two owners, the original owner may now step down
        svc.change_role(ws, UserId::new(1), 1, WorkspaceRole::Admin)
            .await
            .unwrap();
        assert_eq!(
            store.count_by_role(ws, WorkspaceRole::Owner).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn membership_from_other_workspace_is_invisible() {
        let (svc, store, ws) = seeded().await;
        let other = store
            .create(CreateMembership {
                workspace_id: WorkspaceId::new(2),
                user_id: UserId::new(9),
                role: WorkspaceRole::Viewer,
            })
            .await
            .unwrap();

        let err = svc
            .change_role(ws, UserId::new(1), other.id, WorkspaceRole::Editor)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
