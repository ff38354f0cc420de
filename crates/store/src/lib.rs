//! `tallybook-store` — the generic entity repository.
//!
//! Every domain table gets the same data-access surface: CRUD, pagination,
//! bulk operations, soft delete, slug uniqueness/archiving, and name search.
//! Which of those an entity supports is declared through capability traits
//! ([`SoftDeletable`], [`Sluggable`], [`Nameable`]) checked at compile time,
//! not by probing the table shape at call time.
//!
//! Two backends implement the contract: [`MemoryRepository`] for tests/dev
//! and [`PgRepository`] for production.

pub mod memory;
pub mod page;
pub mod postgres;
pub mod record;
pub mod repository;

pub use memory::{MemoryRecord, MemoryRepository};
pub use page::{FindAllOptions, Page, PageWindow, SearchOptions, StoreLimits};
pub use postgres::{decode_text_column, PgQueryAs, PgRecord, PgRepository};
pub use record::{Nameable, Record, Sluggable, SoftDeletable, WorkspaceScoped};
pub use repository::{
    Repository, ScopedRepository, ScopedSearchRepository, SearchRepository, SlugRepository,
    SoftDeleteRepository,
};
