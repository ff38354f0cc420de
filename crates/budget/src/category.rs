//! Spending categories. Slug-addressable, soft-deleting, name-searchable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

use tallybook_core::WorkspaceId;
use tallybook_store::{
    MemoryRecord, MemoryRepository, Nameable, PgQueryAs, PgRecord, PgRepository, Record,
    ScopedRepository, ScopedSearchRepository, SlugRepository, Sluggable, SoftDeletable,
    WorkspaceScoped,
};

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub slug: String,
    /// Hex color shown next to the category in listings.
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateCategory {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub color: Option<String>,
}

impl Record for Category {
    const TABLE: &'static str = "categories";
    type Create = CreateCategory;
    type Update = UpdateCategory;

    fn id(&self) -> i64 {
        self.id
    }
}

impl SoftDeletable for Category {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

impl Sluggable for Category {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn set_slug(&mut self, slug: String) {
        self.slug = slug;
    }
}

impl Nameable for Category {
    fn name(&self) -> &str {
        &self.name
    }
}

impl WorkspaceScoped for Category {
    fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }
}

impl MemoryRecord for Category {
    fn from_create(id: i64, created_at: DateTime<Utc>, input: &Self::Create) -> Self {
        Self {
            id,
            workspace_id: input.workspace_id,
            name: input.name.clone(),
            slug: input.slug.clone(),
            color: input.color.clone(),
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
        if let Some(color) = &input.color {
            self.color = Some(color.clone());
        }
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Category {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: WorkspaceId::new(row.try_get("workspace_id")?),
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            color: row.try_get("color")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl PgRecord for Category {
    const INSERT_COLUMNS: &'static [&'static str] = &["workspace_id", "name", "slug", "color"];

    fn bind_insert<'q>(query: PgQueryAs<'q, Self>, input: &'q Self::Create) -> PgQueryAs<'q, Self> {
        query
            .bind(input.workspace_id.as_i64())
            .bind(&input.name)
            .bind(&input.slug)
            .bind(&input.color)
    }

    fn update_columns(input: &Self::Update) -> Vec<&'static str> {
        let mut columns = Vec::new();
        if input.name.is_some() {
            columns.push("name");
        }
        if input.slug.is_some() {
            columns.push("slug");
        }
        if input.color.is_some() {
            columns.push("color");
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
        if let Some(color) = &input.color {
            query = query.bind(color);
        }
        query
    }
}

/// Storage surface category routes work against. Listings and lookups go
/// through the workspace-scoped operations.
pub trait CategoryStore:
    SlugRepository<Category>
    + ScopedRepository<Category>
    + ScopedSearchRepository<Category>
    + Send
    + Sync
{
}

impl CategoryStore for MemoryRepository<Category> {}
impl CategoryStore for PgRepository<Category> {}
