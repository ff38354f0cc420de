//! Workspaces: the multi-tenant boundary every budget record lives under.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

use tallybook_core::{DomainError, DomainResult, UserId, WorkspaceId};
use tallybook_auth::WorkspaceRole;
use tallybook_store::{
    MemoryRecord, MemoryRepository, Nameable, PgQueryAs, PgRecord, PgRepository, Record,
    SlugRepository, Sluggable, SearchRepository, SoftDeletable,
};

use crate::membership::{CreateMembership, Membership, MembershipStore};

#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn workspace_id(&self) -> WorkspaceId {
        WorkspaceId::new(self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkspace {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkspace {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

impl Record for Workspace {
    const TABLE: &'static str = "workspaces";
    type Create = CreateWorkspace;
    type Update = UpdateWorkspace;

    fn id(&self) -> i64 {
        self.id
    }
}

impl SoftDeletable for Workspace {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

impl Sluggable for Workspace {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn set_slug(&mut self, slug: String) {
        self.slug = slug;
    }
}

impl Nameable for Workspace {
    fn name(&self) -> &str {
        &self.name
    }
}

impl MemoryRecord for Workspace {
    fn from_create(id: i64, created_at: DateTime<Utc>, input: &Self::Create) -> Self {
        Self {
            id,
            name: input.name.clone(),
            slug: input.slug.clone(),
            description: input.description.clone(),
            created_at,
            deleted_at: None,
        }
    }

    fn apply_update(&mut self, input: &Self::Update) {
        if let Some(name) = &input.name {
            self.name = name.clone();
        }
        if let Some(slug) = &input.slug {
            self.slug = slug.clone();
        }
        if let Some(description) = &input.description {
            self.description = Some(description.clone());
        }
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Workspace {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl PgRecord for Workspace {
    const INSERT_COLUMNS: &'static [&'static str] = &["name", "slug", "description"];

    fn bind_insert<'q>(query: PgQueryAs<'q, Self>, input: &'q Self::Create) -> PgQueryAs<'q, Self> {
        query
            .bind(&input.name)
            .bind(&input.slug)
            .bind(&input.description)
    }

    fn update_columns(input: &Self::Update) -> Vec<&'static str> {
        let mut columns = Vec::new();
        if input.name.is_some() {
            columns.push("name");
        }
        if input.slug.is_some() {
            columns.push("slug");
        }
        if input.description.is_some() {
            columns.push("description");
        }
        columns
    }

    fn bind_update<'q>(
        mut query: PgQueryAs<'q, Self>,
        input: &'q Self::Update,
    ) -> PgQueryAs<'q, Self> {
        if let Some(name) = &input.name {
            query = query.bind(name);
        }
        if let Some(slug) = &input.slug {
            query = query.bind(slug);
        }
        if let Some(description) = &input.description {
            query = query.bind(description);
        }
        query
    }
}

/// Storage surface the workspace service works against.
pub trait WorkspaceStore:
    SlugRepository<Workspace> + SearchRepository<Workspace> + Send + Sync
{
}

impl WorkspaceStore for MemoryRepository<Workspace> {}
impl WorkspaceStore for PgRepository<Workspace> {}

fn validate_slug(slug: &str) -> DomainResult<()> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(DomainError::validation_field(
            "slug must be lowercase letters, digits, and hyphens",
            "slug",
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation_field("name must not be empty", "name"));
    }
    Ok(())
}

/// Workspace lifecycle: creation (creator becomes owner), rename/re-slug,
/// and soft deletion with slug archiving.
pub struct WorkspaceService {
    workspaces: Arc<dyn WorkspaceStore>,
    memberships: Arc<dyn MembershipStore>,
}

impl WorkspaceService {
    pub fn new(workspaces: Arc<dyn WorkspaceStore>, memberships: Arc<dyn MembershipStore>) -> Self {
        Self {
            workspaces,
            memberships,
        }
    }

    /// Create a workspace and make `creator` its owner.
    pub async fn create(&self, creator: UserId, input: CreateWorkspace) -> DomainResult<Workspace> {
        validate_name(&input.name)?;
        validate_slug(&input.slug)?;
        if !self.workspaces.is_slug_unique(&input.slug, None).await? {
            return Err(DomainError::conflict(format!(
                "slug '{}' is already in use",
                input.slug
            )));
        }

        let workspace = self.workspaces.create(input).await?;
        self.memberships
            .create(CreateMembership {
                workspace_id: workspace.workspace_id(),
                user_id: creator,
                role: WorkspaceRole::Owner,
            })
            .await?;

        tracing::info!(
            workspace_id = workspace.id,
            user_id = %creator,
            slug = %workspace.slug,
            "workspace created"
        );
        Ok(workspace)
    }

    pub async fn get(&self, id: WorkspaceId) -> DomainResult<Workspace> {
        self.workspaces.find_by_id_or_fail(id.as_i64()).await
    }

    pub async fn update(&self, id: WorkspaceId, input: UpdateWorkspace) -> DomainResult<Workspace> {
        if let Some(name) = &input.name {
            validate_name(name)?;
        }
        if let Some(slug) = &input.slug {
            validate_slug(slug)?;
            if !self
                .workspaces
                .is_slug_unique(slug, Some(id.as_i64()))
                .await?
            {
                return Err(DomainError::conflict(format!(
                    "slug '{slug}' is already in use"
                )));
            }
        }
        self.workspaces.update(id.as_i64(), input).await
    }

    /// Soft-delete the workspace, archiving its slug for reuse.
    pub async fn delete(&self, id: WorkspaceId) -> DomainResult<Workspace> {
        let deleted = self
            .workspaces
            .soft_delete_with_slug_archive(id.as_i64())
            .await?;
        tracing::info!(workspace_id = id.as_i64(), "workspace soft-deleted");
        Ok(deleted)
    }

    /// All active workspaces the user belongs to, with their membership role.
    pub async fn list_for_user(
        &self,
        user: UserId,
    ) -> DomainResult<Vec<(Workspace, WorkspaceRole)>> {
        let memberships: Vec<Membership> = self.memberships.find_by_user(user).await?;
        let mut out = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let Some(workspace) = self
                .workspaces
                .find_by_id(membership.workspace_id.as_i64())
                .await?
            else {
                continue;
            };
            if workspace.is_deleted() {
                continue;
            }
            out.push((workspace, membership.role));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> WorkspaceService {
        WorkspaceService::new(
            Arc::new(MemoryRepository::<Workspace>::new("workspace")),
            Arc::new(MemoryRepository::<Membership>::new("membership")),
        )
    }

    #[tokio::test]
    async fn creator_becomes_owner() {
        let svc = service();
        let ws = svc
            .create(
                UserId::new(1),
                CreateWorkspace {
                    name: "Household".into(),
                    slug: "household".into(),
                    description: None,
                },
            )
            .await
            .unwrap();

        let listed = svc.list_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0.id, ws.id);
        assert_eq!(listed[0].1, WorkspaceRole::Owner);
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let svc = service();
        let input = CreateWorkspace {
            name: "Household".into(),
            slug: "household".into(),
            description: None,
        };
        svc.create(UserId::new(1), input.clone()).await.unwrap();

        let err = svc.create(UserId::new(2), input).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn deleting_frees_the_slug() {
        let svc = service();
        let ws = svc
            .create(
                UserId::new(1),
                CreateWorkspace {
                    name: "Household".into(),
                    slug: "household".into(),
                    description: None,
                },
            )
            .await
            .unwrap();

        svc.delete(ws.workspace_id()).await.unwrap();

        svc.create(
            UserId::new(1),
            CreateWorkspace {
                name: "Household again".into(),
                slug: "household".into(),
                description: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn bad_slug_is_field_attributed() {
        let svc = service();
        let err = svc
            .create(
                UserId::new(1),
                CreateWorkspace {
                    name: "X".into(),
                    slug: "Not A Slug".into(),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("slug"));
    }

    #[tokio::test]
    async fn deleted_workspaces_are_not_listed() {
        let svc = service();
        let ws = svc
            .create(
                UserId::new(1),
                CreateWorkspace {
                    name: "Household".into(),
                    slug: "household".into(),
                    description: None,
                },
            )
            .await
            .unwrap();
        svc.delete(ws.workspace_id()).await.unwrap();

        assert!(svc.list_for_user(UserId::new(1)).await.unwrap().is_empty());
    }
}
