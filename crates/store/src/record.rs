//! Record and capability traits.
//!
//! The original column-sniffing approach ("does this table have a
//! `deleted_at` column?") is replaced by capabilities a record declares
//! statically. A repository method that needs a capability is only available
//! when the record implements it.

use chrono::{DateTime, Utc};

use tallybook_core::WorkspaceId;

/// A persistent entity row.
///
/// Every record has a numeric serial primary key and names its table; the
/// creation and update input shapes are associated types so the repository
/// contract can be written once.
pub trait Record: Clone + Send + Sync + Unpin + 'static {
    /// Table name, used by the SQL backend and in diagnostics.
    const TABLE: &'static str;

    /// Shape accepted by `create`/`bulk_create`.
    type Create: Send + Sync + 'static;

    /// Shape accepted by `update`. Typically a struct of `Option`s so a
    /// request can patch a subset of columns.
    type Update: Send + Sync + 'static;

    fn id(&self) -> i64;
}

/// Capability: the record soft-deletes via a `deleted_at` timestamp.
pub trait SoftDeletable: Record {
    /// Column holding the soft-delete marker.
    const DELETED_AT_COLUMN: &'static str = "deleted_at";

    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// Capability: the record carries a human-readable slug, unique among
/// *active* rows of its table.
///
/// Slug-bearing entities in this domain always soft-delete, which is what
/// makes slug archiving (freeing a deleted row's slug for reuse) coherent.
pub trait Sluggable: SoftDeletable {
    /// Column holding the slug.
    const SLUG_COLUMN: &'static str = "slug";

    fn slug(&self) -> &str;

    fn set_slug(&mut self, slug: String);
}

/// Capability: the record has a searchable `name` column.
pub trait Nameable: SoftDeletable {
    /// Column holding the display name.
    const NAME_COLUMN: &'static str = "name";

    fn name(&self) -> &str;
}

/// Capability: the record belongs to exactly one workspace.
///
/// Scoped lookups and listings treat the workspace as a hard boundary: a row
/// from another workspace is indistinguishable from an absent one.
pub trait WorkspaceScoped: Record {
    /// Column holding the owning workspace id.
    const WORKSPACE_COLUMN: &'static str = "workspace_id";

    fn workspace_id(&self) -> WorkspaceId;
}
