//! In-memory repository backend.
//!
//! Intended for tests/dev. Each operation holds the table lock for its full
//! duration, so check-then-act sequences are atomic here. Not optimized for
//! performance.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tallybook_core::{DomainError, DomainResult, WorkspaceId};

use crate::page::{FindAllOptions, Page, SearchOptions, StoreLimits};
use crate::record::{Nameable, Record, Sluggable, SoftDeletable, WorkspaceScoped};
use crate::repository::{
    Repository, ScopedRepository, ScopedSearchRepository, SearchRepository, SlugRepository,
    SoftDeleteRepository,
};

/// Construction/patching hooks the in-memory backend needs; the SQL backend
/// gets the equivalent from `RETURNING *`.
pub trait MemoryRecord: Record {
    fn from_create(id: i64, created_at: DateTime<Utc>, input: &Self::Create) -> Self;

    fn apply_update(&mut self, input: &Self::Update);
}

/// Generic in-memory table.
pub struct MemoryRepository<E: MemoryRecord> {
    entity_name: &'static str,
    limits: StoreLimits,
    rows: RwLock<BTreeMap<i64, E>>,
    next_id: AtomicI64,
}

impl<E: MemoryRecord> MemoryRepository<E> {
    pub fn new(entity_name: &'static str) -> Self {
        Self::with_limits(entity_name, StoreLimits::default())
    }

    pub fn with_limits(entity_name: &'static str, limits: StoreLimits) -> Self {
        Self {
            entity_name,
            limits,
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn read(&self, operation: &str) -> DomainResult<std::sync::RwLockReadGuard<'_, BTreeMap<i64, E>>> {
        self.rows
            .read()
            .map_err(|_| DomainError::database(operation, "lock poisoned"))
    }

    fn write(
        &self,
        operation: &str,
    ) -> DomainResult<std::sync::RwLockWriteGuard<'_, BTreeMap<i64, E>>> {
        self.rows
            .write()
            .map_err(|_| DomainError::database(operation, "lock poisoned"))
    }

    /// Rows matching a predicate. Lets domain crates build entity-specific
    /// queries (find-by-token, find-pending, ...) on top of the generic
    /// table.
    pub fn filter(&self, predicate: impl Fn(&E) -> bool) -> DomainResult<Vec<E>> {
        Ok(self
            .read("filter")?
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect())
    }

    /// Mutate one row in place under the table lock; `NOT_FOUND` when
    /// absent. Returns the updated row.
    pub fn mutate(&self, id: i64, f: impl FnOnce(&mut E)) -> DomainResult<E> {
        let mut rows = self.write("mutate")?;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(self.entity_name, id))?;
        f(row);
        Ok(row.clone())
    }
}

#[async_trait]
impl<E: MemoryRecord> Repository<E> for MemoryRepository<E> {
    fn entity_name(&self) -> &str {
        self.entity_name
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<E>> {
        Ok(self.read("find_by_id")?.get(&id).cloned())
    }

    async fn find_all(&self, options: FindAllOptions) -> DomainResult<Page<E>> {
        let window = options.resolve(&self.limits);
        let rows = self.read("find_all")?;
        let total = rows.len() as u64;
        let data = rows
            .values()
            .rev()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .cloned()
            .collect();
        Ok(Page::from_window(data, total, window))
    }

    async fn create(&self, input: E::Create) -> DomainResult<E> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = E::from_create(id, Utc::now(), &input);
        self.write("create")?.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, input: E::Update) -> DomainResult<E> {
        let mut rows = self.write("update")?;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(self.entity_name, id))?;
        row.apply_update(&input);
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        self.write("delete")?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(self.entity_name, id))
    }

    async fn bulk_create(&self, inputs: Vec<E::Create>) -> DomainResult<Vec<E>> {
        if inputs.len() > self.limits.max_bulk_create {
            return Err(DomainError::database(
                "bulk_create",
                format!(
                    "batch of {} exceeds maximum of {}",
                    inputs.len(),
                    self.limits.max_bulk_create
                ),
            ));
        }

        let mut rows = self.write("bulk_create")?;
        let mut created = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let row = E::from_create(id, Utc::now(), input);
            rows.insert(id, row.clone());
            created.push(row);
        }
        Ok(created)
    }

    async fn bulk_delete(&self, ids: &[i64]) -> DomainResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut rows = self.write("bulk_delete")?;
        let mut affected = 0u64;
        for id in ids {
            if rows.remove(id).is_some() {
                affected += 1;
            }
        }

        if affected == 0 {
            return Err(DomainError::database("bulk_delete", "0 rows affected"));
        }
        Ok(())
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.read("count")?.len() as u64)
    }
}

#[async_trait]
impl<E: MemoryRecord + SoftDeletable> SoftDeleteRepository<E> for MemoryRepository<E> {
    async fn soft_delete(&self, id: i64) -> DomainResult<E> {
        self.mutate(id, |row| row.set_deleted_at(Some(Utc::now())))
    }
}

#[async_trait]
impl<E: MemoryRecord + Sluggable> SlugRepository<E> for MemoryRepository<E> {
    async fn find_by_slug(&self, slug: &str) -> DomainResult<Option<E>> {
        Ok(self
            .read("find_by_slug")?
            .values()
            .find(|e| !e.is_deleted() && e.slug() == slug)
            .cloned())
    }

    async fn is_slug_unique(&self, slug: &str, exclude_id: Option<i64>) -> DomainResult<bool> {
        Ok(!self.read("is_slug_unique")?.values().any(|e| {
            !e.is_deleted() && e.slug() == slug && Some(e.id()) != exclude_id
        }))
    }

    async fn soft_delete_with_slug_archive(&self, id: i64) -> DomainResult<E> {
        let now = Utc::now();
        self.mutate(id, |row| {
            let archived = format!("{}-deleted-{}", row.slug(), now.timestamp_millis());
            row.set_slug(archived);
            row.set_deleted_at(Some(now));
        })
    }
}

#[async_trait]
impl<E: MemoryRecord + Nameable> SearchRepository<E> for MemoryRepository<E> {
    async fn search_by_name(&self, query: &str, options: SearchOptions) -> DomainResult<Vec<E>> {
        let needle = query.to_lowercase();
        let mut hits: Vec<E> = self
            .read("search_by_name")?
            .values()
            .filter(|e| !(options.exclude_deleted && e.is_deleted()))
            .filter(|e| e.name().to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name().cmp(b.name()));
        hits.truncate(options.limit as usize);
        Ok(hits)
    }
}

#[async_trait]
impl<E: MemoryRecord + WorkspaceScoped> ScopedRepository<E> for MemoryRepository<E> {
    async fn find_by_workspace(
        &self,
        workspace: WorkspaceId,
        options: FindAllOptions,
    ) -> DomainResult<Page<E>> {
        let window = options.resolve(&self.limits);
        let rows = self.read("find_by_workspace")?;
        let matching: Vec<&E> = rows
            .values()
            .rev()
            .filter(|e| e.workspace_id() == workspace)
            .collect();
        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .cloned()
            .collect();
        Ok(Page::from_window(data, total, window))
    }
}

#[async_trait]
impl<E: MemoryRecord + WorkspaceScoped + Nameable> ScopedSearchRepository<E>
    for MemoryRepository<E>
{
    async fn search_in_workspace(
        &self,
        workspace: WorkspaceId,
        query: &str,
        options: SearchOptions,
    ) -> DomainResult<Vec<E>> {
        let needle = query.to_lowercase();
        let mut hits: Vec<E> = self
            .read("search_in_workspace")?
            .values()
            .filter(|e| e.workspace_id() == workspace)
            .filter(|e| !(options.exclude_deleted && e.is_deleted()))
            .filter(|e| e.name().to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name().cmp(b.name()));
        hits.truncate(options.limit as usize);
        Ok(hits)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal record exercising every capability.
    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: i64,
        name: String,
        slug: String,
        created_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Clone)]
    struct CreateNote {
        name: String,
        slug: String,
    }

    #[derive(Debug, Clone, Default)]
    struct UpdateNote {
        name: Option<String>,
    }

    impl Record for Note {
        const TABLE: &'static str = "notes";
        type Create = CreateNote;
        type Update = UpdateNote;

        fn id(&self) -> i64 {
            self.id
        }
    }

    impl MemoryRecord for Note {
        fn from_create(id: i64, created_at: DateTime<Utc>, input: &CreateNote) -> Self {
            Self {
                id,
                name: input.name.clone(),
                slug: input.slug.clone(),
                created_at,
                deleted_at: None,
            }
        }

        fn apply_update(&mut self, input: &UpdateNote) {
            if let Some(name) = &input.name {
                self.name = name.clone();
            }
        }
    }

    impl SoftDeletable for Note {
        fn deleted_at(&self) -> Option<DateTime<Utc>> {
            self.deleted_at
        }

        fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
            self.deleted_at = at;
        }
    }

    impl Sluggable for Note {
        fn slug(&self) -> &str {
            &self.slug
        }

        fn set_slug(&mut self, slug: String) {
            self.slug = slug;
        }
    }

    impl Nameable for Note {
        fn name(&self) -> &str {
            &self.name
        }
    }

    fn repo() -> MemoryRepository<Note> {
        MemoryRepository::new("note")
    }

    fn note(name: &str, slug: &str) -> CreateNote {
        CreateNote {
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let repo = repo();
        let created = repo.create(note("Rent", "rent")).await.unwrap();
        assert!(created.id > 0);

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.name, "Rent");
    }

    #[tokio::test]
    async fn find_by_id_or_fail_reports_entity_and_id() {
        let repo = repo();
        let err = repo.find_by_id_or_fail(99).await.unwrap_err();
        assert_eq!(err, DomainError::not_found("note", 99));
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found_before_write() {
        let repo = repo();
        let err = repo.update(5, UpdateNote::default()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_patches_only_provided_fields() {
        let repo = repo();
        let created = repo.create(note("Rent", "rent")).await.unwrap();
        let updated = repo
            .update(
                created.id,
                UpdateNote {
                    name: Some("Mortgage".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Mortgage");
        assert_eq!(updated.slug, "rent");
    }

    #[tokio::test]
    async fn delete_then_exists_is_false() {
        let repo = repo();
        let created = repo.create(note("Rent", "rent")).await.unwrap();
        repo.delete(created.id).await.unwrap();
        assert!(!repo.exists(created.id).await.unwrap());
        assert!(repo.delete(created.id).await.is_err());
    }

    #[tokio::test]
    async fn soft_delete_keeps_row_visible_by_id_but_not_by_slug() {
        let repo = repo();
        let created = repo.create(note("Rent", "rent")).await.unwrap();

        let deleted = repo.soft_delete(created.id).await.unwrap();
        assert!(deleted.deleted_at.is_some());

        // Still addressable by id.
        assert!(repo.find_by_id(created.id).await.unwrap().is_some());
        // Excluded from slug lookup.
        assert!(repo.find_by_slug("rent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn slug_archive_frees_the_original_slug() {
        let repo = repo();
        let created = repo.create(note("Rent", "rent")).await.unwrap();

        let archived = repo.soft_delete_with_slug_archive(created.id).await.unwrap();
        assert!(archived.slug.starts_with("rent-deleted-"));
        assert!(archived.deleted_at.is_some());

        assert!(repo.is_slug_unique("rent", None).await.unwrap());
        let replacement = repo.create(note("Rent v2", "rent")).await.unwrap();
        assert_eq!(repo.find_by_slug("rent").await.unwrap().unwrap().id, replacement.id);
    }

    #[tokio::test]
    async fn is_slug_unique_excludes_own_id_on_update() {
        let repo = repo();
        let created = repo.create(note("Rent", "rent")).await.unwrap();
        assert!(!repo.is_slug_unique("rent", None).await.unwrap());
        assert!(repo.is_slug_unique("rent", Some(created.id)).await.unwrap());
    }

    #[tokio::test]
    async fn bulk_create_enforces_the_preflight_limit() {
        let repo = MemoryRepository::<Note>::with_limits(
            "note",
            StoreLimits {
                max_bulk_create: 3,
                ..Default::default()
            },
        );

        let over: Vec<_> = (0..4).map(|i| note("n", &format!("n-{i}"))).collect();
        let err = repo.bulk_create(over).await.unwrap_err();
        assert!(matches!(err, DomainError::Database { .. }));
        assert_eq!(repo.count().await.unwrap(), 0, "nothing written pre-flight");

        let ok: Vec<_> = (0..3).map(|i| note("n", &format!("n-{i}"))).collect();
        assert_eq!(repo.bulk_create(ok).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn bulk_delete_empty_is_a_no_op_and_zero_affected_errors() {
        let repo = repo();
        repo.bulk_delete(&[]).await.unwrap();

        let err = repo.bulk_delete(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, DomainError::Database { .. }));

        let a = repo.create(note("A", "a")).await.unwrap();
        let b = repo.create(note("B", "b")).await.unwrap();
        repo.bulk_delete(&[a.id, b.id, 999]).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_all_pages_newest_first() {
        let repo = repo();
        for i in 0..25 {
            repo.create(note(&format!("Note {i}"), &format!("note-{i}")))
                .await
                .unwrap();
        }

        let page = repo
            .find_all(FindAllOptions {
                page: Some(2),
                page_size: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.total, 25);
        assert!(page.has_next);
        assert!(page.has_previous);
        // Ordered by id descending.
        assert!(page.data.windows(2).all(|w| w[0].id > w[1].id));

        let last = repo
            .find_all(FindAllOptions {
                page: Some(3),
                page_size: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(last.data.len(), 5);
        assert!(!last.has_next);
    }

    #[tokio::test]
    async fn find_all_explicit_window_wins() {
        let repo = repo();
        for i in 0..10 {
            repo.create(note(&format!("Note {i}"), &format!("note-{i}")))
                .await
                .unwrap();
        }

        let page = repo
            .find_all(FindAllOptions {
                page: Some(1),
                page_size: Some(100),
                limit: Some(3),
                offset: Some(4),
            })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 3);
        assert_eq!(page.data[0].id, 6);
    }

    #[tokio::test]
    async fn search_by_name_is_case_insensitive_and_sorted() {
        let repo = repo();
        repo.create(note("Groceries", "groceries")).await.unwrap();
        repo.create(note("Dining out", "dining-out")).await.unwrap();
        repo.create(note("Gifts", "gifts")).await.unwrap();
        let deleted = repo.create(note("Gym", "gym")).await.unwrap();
        repo.soft_delete(deleted.id).await.unwrap();

        let hits = repo.search_by_name("g", SearchOptions::default()).await.unwrap();
        let names: Vec<_> = hits.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Dining out", "Gifts", "Groceries"]);

        let with_deleted = repo
            .search_by_name(
                "gym",
                SearchOptions {
                    exclude_deleted: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(with_deleted.len(), 1);
    }
}
