//! The repository contract.
//!
//! Failure semantics, uniformly: absence on point lookups is `Ok(None)`,
//! everything unexpected is a `DATABASE_ERROR` tagged with the operation
//! name, and already-typed `DomainError`s pass through unchanged.

use async_trait::async_trait;

use tallybook_core::{DomainError, DomainResult, WorkspaceId};

use crate::page::{FindAllOptions, Page, SearchOptions};
use crate::record::{Nameable, Record, Sluggable, SoftDeletable, WorkspaceScoped};

/// Core operations available for every record.
#[async_trait]
pub trait Repository<E: Record>: Send + Sync {
    /// Human-readable entity name used in error messages.
    fn entity_name(&self) -> &str;

    /// Point lookup. Absence is not an error.
    async fn find_by_id(&self, id: i64) -> DomainResult<Option<E>>;

    /// Point lookup that fails with `NOT_FOUND` when absent.
    async fn find_by_id_or_fail(&self, id: i64) -> DomainResult<E> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(self.entity_name(), id))
    }

    /// Paginated listing, ordered by primary key descending
    /// (most-recent-first). Concrete repositories with different ordering
    /// needs state so themselves.
    async fn find_all(&self, options: FindAllOptions) -> DomainResult<Page<E>>;

    /// Insert one row; fails with `DATABASE_ERROR` if the insert returns no
    /// row.
    async fn create(&self, input: E::Create) -> DomainResult<E>;

    /// Patch one row. Existence is asserted first, so `NOT_FOUND` propagates
    /// before any write is attempted.
    async fn update(&self, id: i64, input: E::Update) -> DomainResult<E>;

    /// Hard delete. Existence is asserted first; an affected count of zero
    /// afterwards means a concurrent writer won the race and is reported as
    /// `DATABASE_ERROR`.
    async fn delete(&self, id: i64) -> DomainResult<()>;

    /// Insert a batch. Batches over the configured maximum are rejected
    /// before any row is written.
    async fn bulk_create(&self, inputs: Vec<E::Create>) -> DomainResult<Vec<E>>;

    /// Single set-membership delete. Empty input is a silent no-op; zero
    /// rows affected on non-empty input is a `DATABASE_ERROR`.
    async fn bulk_delete(&self, ids: &[i64]) -> DomainResult<()>;

    /// Total row count, no filtering.
    async fn count(&self) -> DomainResult<u64>;

    async fn exists(&self, id: i64) -> DomainResult<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }
}

/// Operations for soft-deletable records.
#[async_trait]
pub trait SoftDeleteRepository<E: SoftDeletable>: Repository<E> {
    /// Mark the row deleted (sets `deleted_at` to the current timestamp).
    /// The row remains visible to `find_by_id`.
    async fn soft_delete(&self, id: i64) -> DomainResult<E>;
}

/// Operations for slug-bearing records.
#[async_trait]
pub trait SlugRepository<E: Sluggable>: SoftDeleteRepository<E> {
    /// Lookup by slug among active (non-deleted) rows only.
    async fn find_by_slug(&self, slug: &str) -> DomainResult<Option<E>>;

    /// Whether `slug` is unused among active rows. `exclude_id` lets a row
    /// keep its own slug on update.
    async fn is_slug_unique(&self, slug: &str, exclude_id: Option<i64>) -> DomainResult<bool>;

    /// Soft-delete and rewrite the slug to `{slug}-deleted-{unix_millis}` in
    /// one statement, freeing the original slug with no window in which two
    /// active rows share it.
    async fn soft_delete_with_slug_archive(&self, id: i64) -> DomainResult<E>;
}

/// Operations for records with a searchable name.
#[async_trait]
pub trait SearchRepository<E: Nameable>: Repository<E> {
    /// Case-insensitive substring match on the name column, ascending by
    /// name.
    async fn search_by_name(&self, query: &str, options: SearchOptions) -> DomainResult<Vec<E>>;
}

/// Operations for workspace-scoped records. These never cross the tenant
/// boundary.
#[async_trait]
pub trait ScopedRepository<E: WorkspaceScoped>: Repository<E> {
    /// Paginated listing of one workspace's rows, ordered by primary key
    /// descending.
    async fn find_by_workspace(
        &self,
        workspace: WorkspaceId,
        options: FindAllOptions,
    ) -> DomainResult<Page<E>>;

    /// Point lookup that fails `NOT_FOUND` unless the row exists *and*
    /// belongs to `workspace`.
    async fn find_in_workspace(&self, workspace: WorkspaceId, id: i64) -> DomainResult<E> {
        let row = self.find_by_id_or_fail(id).await?;
        if row.workspace_id() != workspace {
            return Err(DomainError::not_found(self.entity_name(), id));
        }
        Ok(row)
    }
}

/// Name search restricted to one workspace's rows.
#[async_trait]
pub trait ScopedSearchRepository<E: WorkspaceScoped + Nameable>: SearchRepository<E> {
    /// `search_by_name`, but matching only within `workspace`.
    async fn search_in_workspace(
        &self,
        workspace: WorkspaceId,
        query: &str,
        options: SearchOptions,
    ) -> DomainResult<Vec<E>>;
}
