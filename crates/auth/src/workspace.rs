//! Workspace membership roles and the static role→permission matrix.
//!
//! Everything here is pure policy: no I/O, no failure modes beyond parse
//! errors on the wire vocabulary.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tallybook_core::DomainError;

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

/// Role of a member within a workspace.
///
/// Roles form a total order via `rank()`: owner > admin > editor > viewer.
/// Exactly one role per (user, workspace) membership.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Admin,
    Editor,
    Viewer,
}

impl WorkspaceRole {
    /// Hierarchy rank (owner=4 ... viewer=1).
    pub fn rank(&self) -> u8 {
        match self {
            WorkspaceRole::Owner => 4,
            WorkspaceRole::Admin => 3,
            WorkspaceRole::Editor => 2,
            WorkspaceRole::Viewer => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Admin => "admin",
            WorkspaceRole::Editor => "editor",
            WorkspaceRole::Viewer => "viewer",
        }
    }

    pub const ALL: [WorkspaceRole; 4] = [
        WorkspaceRole::Owner,
        WorkspaceRole::Admin,
        WorkspaceRole::Editor,
        WorkspaceRole::Viewer,
    ];
}

impl core::fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(WorkspaceRole::Owner),
            "admin" => Ok(WorkspaceRole::Admin),
            "editor" => Ok(WorkspaceRole::Editor),
            "viewer" => Ok(WorkspaceRole::Viewer),
            other => Err(DomainError::validation_field(
                format!("unknown workspace role '{other}'"),
                "role",
            )),
        }
    }
}

/// `a` strictly outranks `b`.
pub fn is_role_higher(a: WorkspaceRole, b: WorkspaceRole) -> bool {
    a.rank() > b.rank()
}

/// `a` outranks or equals `b`.
pub fn is_role_higher_or_equal(a: WorkspaceRole, b: WorkspaceRole) -> bool {
    a.rank() >= b.rank()
}

/// Whether `manager` may change or remove a member holding `target`.
///
/// Ownership transfer/revocation is owner-exclusive: for an owner target only
/// another owner qualifies. For every other target a strictly higher role is
/// required.
pub fn can_manage_role(manager: WorkspaceRole, target: WorkspaceRole) -> bool {
    if target == WorkspaceRole::Owner {
        manager == WorkspaceRole::Owner
    } else {
        is_role_higher(manager, target)
    }
}

/// Max role by hierarchy rank, `None` for an empty list.
///
/// A user normally holds one membership per workspace, but the API is defined
/// for the general list case.
pub fn highest_role(roles: &[WorkspaceRole]) -> Option<WorkspaceRole> {
    roles.iter().copied().max_by_key(|r| r.rank())
}

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

/// Entity a permission applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Accounts,
    Transactions,
    Categories,
    Payees,
    Budgets,
    Schedules,
    Views,
    Members,
    Invitations,
    Workspace,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Accounts => "accounts",
            Resource::Transactions => "transactions",
            Resource::Categories => "categories",
            Resource::Payees => "payees",
            Resource::Budgets => "budgets",
            Resource::Schedules => "schedules",
            Resource::Views => "views",
            Resource::Members => "members",
            Resource::Invitations => "invitations",
            Resource::Workspace => "workspace",
        }
    }

    pub const ALL: [Resource; 10] = [
        Resource::Accounts,
        Resource::Transactions,
        Resource::Categories,
        Resource::Payees,
        Resource::Budgets,
        Resource::Schedules,
        Resource::Views,
        Resource::Members,
        Resource::Invitations,
        Resource::Workspace,
    ];
}

impl FromStr for Resource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown resource '{s}'")))
    }
}

/// Action a permission grants on its resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }

    pub const ALL: [Action; 5] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Manage,
    ];
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown action '{s}'")))
    }
}

/// A permission in the closed `entity:action` vocabulary.
///
/// Permissions are immutable and defined at compile time; they are never
/// stored per-user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource.as_str(), self.action.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s.split_once(':').ok_or_else(|| {
            DomainError::validation(format!("permission '{s}' is not of the form entity:action"))
        })?;
        Ok(Self {
            resource: resource.parse()?,
            action: action.parse()?,
        })
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role → permission matrix
// ─────────────────────────────────────────────────────────────────────────────

/// Resources an editor may write to (everything except members, invitations,
/// and the workspace record itself).
const EDITOR_WRITABLE: [Resource; 7] = [
    Resource::Accounts,
    Resource::Transactions,
    Resource::Categories,
    Resource::Payees,
    Resource::Budgets,
    Resource::Schedules,
    Resource::Views,
];

/// True iff `permission` is in the static matrix entry for `role`.
///
/// Invariant: every role's grant set is a superset of each lower role's, the
/// only owner-exclusive grants being `workspace:delete` and
/// `workspace:manage`.
pub fn role_has_permission(role: WorkspaceRole, permission: Permission) -> bool {
    let Permission { resource, action } = permission;

    // Everyone reads everything in their workspace.
    if action == Action::Read {
        return true;
    }

    match role {
        WorkspaceRole::Viewer => false,
        WorkspaceRole::Editor => {
            EDITOR_WRITABLE.contains(&resource)
                && matches!(action, Action::Create | Action::Update | Action::Delete)
        }
        WorkspaceRole::Admin => match resource {
            Resource::Workspace => action == Action::Update,
            Resource::Members | Resource::Invitations => {
                matches!(action, Action::Create | Action::Update | Action::Delete)
            }
            _ => matches!(action, Action::Create | Action::Update | Action::Delete),
        },
        WorkspaceRole::Owner => match resource {
            // manage exists only on the workspace resource
            Resource::Workspace => true,
            _ => matches!(action, Action::Create | Action::Update | Action::Delete),
        },
    }
}

/// Enumerate the matrix entry for `role` (for audit/display surfaces).
pub fn role_permissions(role: WorkspaceRole) -> Vec<Permission> {
    let mut grants = Vec::new();
    for resource in Resource::ALL {
        for action in Action::ALL {
            let p = Permission::new(resource, action);
            if role_has_permission(role, p) {
                grants.push(p);
            }
        }
    }
    grants
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn permission_wire_format_round_trips() {
        let p = Permission::new(Resource::Transactions, Action::Create);
        assert_eq!(p.to_string(), "transactions:create");
        assert_eq!("transactions:create".parse::<Permission>().unwrap(), p);
    }

    #[test]
    fn permission_parse_rejects_malformed_input() {
        assert!("transactions".parse::<Permission>().is_err());
        assert!("gadgets:create".parse::<Permission>().is_err());
        assert!("transactions:explode".parse::<Permission>().is_err());
    }

    #[test]
    fn can_manage_role_asymmetry() {
        use WorkspaceRole::*;
        assert!(!can_manage_role(Admin, Owner));
        assert!(can_manage_role(Owner, Owner));
        assert!(can_manage_role(Admin, Editor));
        assert!(!can_manage_role(Editor, Admin));
        assert!(!can_manage_role(Editor, Editor));
    }

    #[test]
    fn highest_role_picks_max_and_handles_empty() {
        use WorkspaceRole::*;
        assert_eq!(highest_role(&[]), None);
        assert_eq!(highest_role(&[Viewer, Admin, Editor]), Some(Admin));
        assert_eq!(highest_role(&[Owner, Viewer]), Some(Owner));
    }

    #[test]
    fn matrix_is_monotone_up_the_hierarchy() {
        use WorkspaceRole::*;
        let ordered = [Viewer, Editor, Admin, Owner];
        for pair in ordered.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            for p in role_permissions(lower) {
                assert!(
                    role_has_permission(higher, p),
                    "{higher} is missing {p} granted to {lower}"
                );
            }
        }
    }

    #[test]
    fn workspace_manage_and_delete_are_owner_exclusive() {
        use WorkspaceRole::*;
        let manage = Permission::new(Resource::Workspace, Action::Manage);
        let delete = Permission::new(Resource::Workspace, Action::Delete);
        for role in [Viewer, Editor, Admin] {
            assert!(!role_has_permission(role, manage));
            assert!(!role_has_permission(role, delete));
        }
        assert!(role_has_permission(Owner, manage));
        assert!(role_has_permission(Owner, delete));
    }

    #[test]
    fn viewer_reads_but_never_writes() {
        for resource in Resource::ALL {
            assert!(role_has_permission(
                WorkspaceRole::Viewer,
                Permission::new(resource, Action::Read)
            ));
            for action in [Action::Create, Action::Update, Action::Delete, Action::Manage] {
                assert!(!role_has_permission(
                    WorkspaceRole::Viewer,
                    Permission::new(resource, action)
                ));
            }
        }
    }

    #[test]
    fn editor_writes_budget_data_but_not_membership() {
        use WorkspaceRole::Editor;
        assert!(role_has_permission(
            Editor,
            Permission::new(Resource::Transactions, Action::Create)
        ));
        assert!(!role_has_permission(
            Editor,
            Permission::new(Resource::Members, Action::Update)
        ));
        assert!(!role_has_permission(
            Editor,
            Permission::new(Resource::Invitations, Action::Create)
        ));
        assert!(!role_has_permission(
            Editor,
            Permission::new(Resource::Workspace, Action::Update)
        ));
    }

    fn arb_role() -> impl Strategy<Value = WorkspaceRole> {
        prop::sample::select(WorkspaceRole::ALL.to_vec())
    }

    proptest! {
        // For any pair of roles exactly one of a>b, b>a, a==b holds.
        #[test]
        fn role_hierarchy_is_a_total_order(a in arb_role(), b in arb_role()) {
            let outcomes = [is_role_higher(a, b), is_role_higher(b, a), a == b];
            prop_assert_eq!(outcomes.iter().filter(|&&x| x).count(), 1);
        }

        #[test]
        fn higher_or_equal_is_reflexive_total(a in arb_role(), b in arb_role()) {
            prop_assert!(is_role_higher_or_equal(a, a));
            prop_assert!(is_role_higher_or_equal(a, b) || is_role_higher_or_equal(b, a));
        }
    }
}
