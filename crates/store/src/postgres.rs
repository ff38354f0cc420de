//! Postgres repository backend (sqlx).
//!
//! SQL text is derived from the record's table and capability column names.
//! Check-then-act sequences (update, delete, soft delete, slug archive) run
//! inside a single transaction with the target row locked, so the existence
//! assertion and the write cannot be interleaved with a concurrent delete.

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::{Postgres, Row};

use tallybook_core::{DomainError, DomainResult, WorkspaceId};

use crate::page::{FindAllOptions, Page, SearchOptions, StoreLimits};
use crate::record::{Nameable, Record, Sluggable, SoftDeletable, WorkspaceScoped};
use crate::repository::{
    Repository, ScopedRepository, ScopedSearchRepository, SearchRepository, SlugRepository,
    SoftDeleteRepository,
};

pub type PgQueryAs<'q, E> = sqlx::query::QueryAs<'q, Postgres, E, PgArguments>;

/// SQL-side knowledge a record must supply: how to read a row back and how
/// to bind its creation/update inputs.
pub trait PgRecord: Record + for<'r> sqlx::FromRow<'r, PgRow> {
    /// Columns written on insert, excluding the serial `id`.
    const INSERT_COLUMNS: &'static [&'static str];

    /// Bind the creation input in `INSERT_COLUMNS` order.
    fn bind_insert<'q>(query: PgQueryAs<'q, Self>, input: &'q Self::Create) -> PgQueryAs<'q, Self>;

    /// SET columns for this update input, in bind order. Empty means the
    /// input patches nothing.
    fn update_columns(input: &Self::Update) -> Vec<&'static str>;

    /// Bind the update input in `update_columns` order.
    fn bind_update<'q>(query: PgQueryAs<'q, Self>, input: &'q Self::Update) -> PgQueryAs<'q, Self>;
}

/// Generic Postgres-backed repository for one table.
pub struct PgRepository<E: PgRecord> {
    pool: PgPool,
    entity_name: &'static str,
    limits: StoreLimits,
    _marker: PhantomData<fn() -> E>,
}

impl<E: PgRecord> PgRepository<E> {
    pub fn new(pool: PgPool, entity_name: &'static str) -> Self {
        Self::with_limits(pool, entity_name, StoreLimits::default())
    }

    pub fn with_limits(pool: PgPool, entity_name: &'static str, limits: StoreLimits) -> Self {
        Self {
            pool,
            entity_name,
            limits,
            _marker: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn db_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DomainError {
        move |e| {
            tracing::error!(operation, error = %e, table = E::TABLE, "store operation failed");
            DomainError::database(operation, e.to_string())
        }
    }

    /// Fetch the row inside `tx` with a row lock, failing `NOT_FOUND` when
    /// absent.
    async fn lock_row(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        id: i64,
        operation: &'static str,
    ) -> DomainResult<E> {
        let sql = format!("SELECT * FROM {} WHERE id = $1 FOR UPDATE", E::TABLE);
        sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Self::db_err(operation))?
            .ok_or_else(|| DomainError::not_found(self.entity_name, id))
    }
}

#[async_trait]
impl<E: PgRecord> Repository<E> for PgRepository<E> {
    fn entity_name(&self) -> &str {
        self.entity_name
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<E>> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", E::TABLE);
        sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err("find_by_id"))
    }

    async fn find_all(&self, options: FindAllOptions) -> DomainResult<Page<E>> {
        let window = options.resolve(&self.limits);

        let count_sql = format!("SELECT COUNT(*) FROM {}", E::TABLE);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::db_err("find_all"))?;

        let sql = format!(
            "SELECT * FROM {} ORDER BY id DESC LIMIT $1 OFFSET $2",
            E::TABLE
        );
        let data = sqlx::query_as::<_, E>(&sql)
            .bind(window.limit as i64)
            .bind(window.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("find_all"))?;

        Ok(Page::from_window(data, total as u64, window))
    }

    async fn create(&self, input: E::Create) -> DomainResult<E> {
        let placeholders = (1..=E::INSERT_COLUMNS.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            E::TABLE,
            E::INSERT_COLUMNS.join(", "),
            placeholders
        );

        E::bind_insert(sqlx::query_as::<_, E>(&sql), &input)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err("create"))?
            .ok_or_else(|| DomainError::database("create", "insert returned no row"))
    }

    async fn update(&self, id: i64, input: E::Update) -> DomainResult<E> {
        let mut tx = self.pool.begin().await.map_err(Self::db_err("update"))?;
        let existing = self.lock_row(&mut tx, id, "update").await?;

        let columns = E::update_columns(&input);
        if columns.is_empty() {
            tx.commit().await.map_err(Self::db_err("update"))?;
            return Ok(existing);
        }

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ${}", col, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ${} RETURNING *",
            E::TABLE,
            assignments,
            columns.len() + 1
        );

        let updated = E::bind_update(sqlx::query_as::<_, E>(&sql), &input)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Self::db_err("update"))?
            .ok_or_else(|| DomainError::database("update", "update affected no rows"))?;

        tx.commit().await.map_err(Self::db_err("update"))?;
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(Self::db_err("delete"))?;
        self.lock_row(&mut tx, id, "delete").await?;

        let sql = format!("DELETE FROM {} WHERE id = $1", E::TABLE);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Self::db_err("delete"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::database("delete", "0 rows affected"));
        }

        tx.commit().await.map_err(Self::db_err("delete"))?;
        Ok(())
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

        let placeholders = (1..=E::INSERT_COLUMNS.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            E::TABLE,
            E::INSERT_COLUMNS.join(", "),
            placeholders
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(Self::db_err("bulk_create"))?;
        let mut created = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let row = E::bind_insert(sqlx::query_as::<_, E>(&sql), input)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Self::db_err("bulk_create"))?
                .ok_or_else(|| DomainError::database("bulk_create", "insert returned no row"))?;
            created.push(row);
        }
        tx.commit().await.map_err(Self::db_err("bulk_create"))?;
        Ok(created)
    }

    async fn bulk_delete(&self, ids: &[i64]) -> DomainResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let sql = format!("DELETE FROM {} WHERE id = ANY($1)", E::TABLE);
        let result = sqlx::query(&sql)
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await
            .map_err(Self::db_err("bulk_delete"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::database("bulk_delete", "0 rows affected"));
        }
        Ok(())
    }

    async fn count(&self) -> DomainResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", E::TABLE);
        let total: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::db_err("count"))?;
        Ok(total as u64)
    }
}

#[async_trait]
impl<E: PgRecord + SoftDeletable> SoftDeleteRepository<E> for PgRepository<E> {
    async fn soft_delete(&self, id: i64) -> DomainResult<E> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(Self::db_err("soft_delete"))?;
        self.lock_row(&mut tx, id, "soft_delete").await?;

        let sql = format!(
            "UPDATE {} SET {} = NOW() WHERE id = $1 RETURNING *",
            E::TABLE,
            E::DELETED_AT_COLUMN
        );
        let row = sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Self::db_err("soft_delete"))?
            .ok_or_else(|| DomainError::database("soft_delete", "update affected no rows"))?;

        tx.commit().await.map_err(Self::db_err("soft_delete"))?;
        Ok(row)
    }
}

#[async_trait]
impl<E: PgRecord + Sluggable> SlugRepository<E> for PgRepository<E> {
    async fn find_by_slug(&self, slug: &str) -> DomainResult<Option<E>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1 AND {} IS NULL",
            E::TABLE,
            E::SLUG_COLUMN,
            E::DELETED_AT_COLUMN
        );
        sqlx::query_as::<_, E>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err("find_by_slug"))
    }

    async fn is_slug_unique(&self, slug: &str, exclude_id: Option<i64>) -> DomainResult<bool> {
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1 AND {} IS NULL",
            E::TABLE,
            E::SLUG_COLUMN,
            E::DELETED_AT_COLUMN
        );
        if exclude_id.is_some() {
            sql.push_str(" AND id <> $2");
        }

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(slug);
        if let Some(id) = exclude_id {
            query = query.bind(id);
        }

        let taken = query
            .fetch_one(&self.pool)
            .await
            .map_err(Self::db_err("is_slug_unique"))?;
        Ok(taken == 0)
    }

    async fn soft_delete_with_slug_archive(&self, id: i64) -> DomainResult<E> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(Self::db_err("soft_delete_with_slug_archive"))?;
        self.lock_row(&mut tx, id, "soft_delete_with_slug_archive")
            .await?;

        // Archive the slug and set the marker in one statement so there is
        // no window in which two active rows hold the same slug.
        let sql = format!(
            "UPDATE {table} SET {slug} = {slug} || '-deleted-' || $2, {deleted} = NOW() \
             WHERE id = $1 RETURNING *",
            table = E::TABLE,
            slug = E::SLUG_COLUMN,
            deleted = E::DELETED_AT_COLUMN
        );
        let millis = chrono::Utc::now().timestamp_millis().to_string();
        let row = sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .bind(millis)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Self::db_err("soft_delete_with_slug_archive"))?
            .ok_or_else(|| {
                DomainError::database("soft_delete_with_slug_archive", "update affected no rows")
            })?;

        tx.commit()
            .await
            .map_err(Self::db_err("soft_delete_with_slug_archive"))?;
        Ok(row)
    }
}

#[async_trait]
impl<E: PgRecord + Nameable> SearchRepository<E> for PgRepository<E> {
    async fn search_by_name(&self, query: &str, options: SearchOptions) -> DomainResult<Vec<E>> {
        // ILIKE keeps the match case-insensitive, matching the in-memory
        // backend.
        let mut sql = format!(
            "SELECT * FROM {} WHERE {} ILIKE $1",
            E::TABLE,
            E::NAME_COLUMN
        );
        if options.exclude_deleted {
            sql.push_str(&format!(" AND {} IS NULL", E::DELETED_AT_COLUMN));
        }
        sql.push_str(&format!(" ORDER BY {} ASC LIMIT $2", E::NAME_COLUMN));

        sqlx::query_as::<_, E>(&sql)
            .bind(format!("%{query}%"))
            .bind(options.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("search_by_name"))
    }
}

#[async_trait]
impl<E: PgRecord + WorkspaceScoped> ScopedRepository<E> for PgRepository<E> {
    async fn find_by_workspace(
        &self,
        workspace: WorkspaceId,
        options: FindAllOptions,
    ) -> DomainResult<Page<E>> {
        let window = options.resolve(&self.limits);

        let count_sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            E::TABLE,
            E::WORKSPACE_COLUMN
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(workspace.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(Self::db_err("find_by_workspace"))?;

        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1 ORDER BY id DESC LIMIT $2 OFFSET $3",
            E::TABLE,
            E::WORKSPACE_COLUMN
        );
        let data = sqlx::query_as::<_, E>(&sql)
            .bind(workspace.as_i64())
            .bind(window.limit as i64)
            .bind(window.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("find_by_workspace"))?;

        Ok(Page::from_window(data, total as u64, window))
    }
}

#[async_trait]
impl<E: PgRecord + WorkspaceScoped + Nameable> ScopedSearchRepository<E> for PgRepository<E> {
    async fn search_in_workspace(
        &self,
        workspace: WorkspaceId,
        query: &str,
        options: SearchOptions,
    ) -> DomainResult<Vec<E>> {
        let mut sql = format!(
            "SELECT * FROM {} WHERE {} = $1 AND {} ILIKE $2",
            E::TABLE,
            E::WORKSPACE_COLUMN,
            E::NAME_COLUMN
        );
        if options.exclude_deleted {
            sql.push_str(&format!(" AND {} IS NULL", E::DELETED_AT_COLUMN));
        }
        sql.push_str(&format!(" ORDER BY {} ASC LIMIT $3", E::NAME_COLUMN));

        sqlx::query_as::<_, E>(&sql)
            .bind(workspace.as_i64())
            .bind(format!("%{query}%"))
            .bind(options.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("search_in_workspace"))
    }
}

/// Decode a text column into a domain enum, surfacing parse failures as
/// column-decode errors.
pub fn decode_text_column<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
