//! Service wiring: which store backend sits behind each domain service.
//!
//! The default build wires the in-memory backend (dev/test). The `postgres`
//! feature adds a constructor over a connection pool with the same surface,
//! so routes never know which backend they run on.

use std::sync::Arc;

use tallybook_budget::{Account, AccountStore, Category, CategoryStore};
use tallybook_store::MemoryRepository;
use tallybook_workspaces::{
    Invitation, InvitationService, Membership, MembershipService, MembershipStore,
    TracingNotifier, Workspace, WorkspaceService,
};

pub struct AppServices {
    pub workspaces: WorkspaceService,
    pub members: MembershipService,
    pub invitations: InvitationService,
    pub categories: Arc<dyn CategoryStore>,
    pub accounts: Arc<dyn AccountStore>,
    /// Shared with the workspace middleware for membership resolution.
    pub membership_store: Arc<dyn MembershipStore>,
}

/// Wire every service over the in-memory backend.
pub fn build_in_memory_services() -> AppServices {
    let workspace_store = Arc::new(MemoryRepository::<Workspace>::new("workspace"));
    let membership_store: Arc<MemoryRepository<Membership>> =
        Arc::new(MemoryRepository::new("membership"));
    let invitation_store = Arc::new(MemoryRepository::<Invitation>::new("invitation"));
    let categories: Arc<dyn CategoryStore> =
        Arc::new(MemoryRepository::<Category>::new("category"));
    let accounts: Arc<dyn AccountStore> = Arc::new(MemoryRepository::<Account>::new("account"));

    AppServices {
        workspaces: WorkspaceService::new(workspace_store, membership_store.clone()),
        members: MembershipService::new(membership_store.clone()),
        invitations: InvitationService::new(
            invitation_store,
            membership_store.clone(),
            Arc::new(TracingNotifier),
        ),
        categories,
        accounts,
        membership_store,
    }
}

/// Wire every service over Postgres.
#[cfg(feature = "postgres")]
pub fn build_postgres_services(pool: sqlx::postgres::PgPool) -> AppServices {
    use tallybook_store::PgRepository;

    let workspace_store = Arc::new(PgRepository::<Workspace>::new(pool.clone(), "workspace"));
    let membership_store: Arc<PgRepository<Membership>> =
        Arc::new(PgRepository::new(pool.clone(), "membership"));
    let invitation_store = Arc::new(PgRepository::<Invitation>::new(pool.clone(), "invitation"));
    let categories: Arc<dyn CategoryStore> =
        Arc::new(PgRepository::<Category>::new(pool.clone(), "category"));
    let accounts: Arc<dyn AccountStore> = Arc::new(PgRepository::<Account>::new(pool, "account"));

    AppServices {
        workspaces: WorkspaceService::new(workspace_store, membership_store.clone()),
        members: MembershipService::new(membership_store.clone()),
        invitations: InvitationService::new(
            invitation_store,
            membership_store.clone(),
            Arc::new(TracingNotifier),
        ),
        categories,
        accounts,
        membership_store,
    }
}
