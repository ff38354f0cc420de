//! Global account roles.
//!
//! This is a deliberately coarse, account-wide model, independent from the
//! workspace membership matrix in [`crate::workspace`]. It gates what an
//! account may do at all (e.g. the admin maintenance surface); workspace
//! membership gates what a member may do inside one workspace.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tallybook_core::DomainError;

use crate::workspace::{Action, Permission};

/// Account-wide role attached to an identity, not to a membership.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalRole {
    Admin,
    User,
    Readonly,
}

impl GlobalRole {
    /// Whether this account role allows `permission` at the global level.
    ///
    /// admin: everything; user: everything except delete-action permissions;
    /// readonly: read-action permissions only.
    pub fn allows(&self, permission: Permission) -> bool {
        match self {
            GlobalRole::Admin => true,
            GlobalRole::User => permission.action != Action::Delete,
            GlobalRole::Readonly => permission.action == Action::Read,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::Admin => "admin",
            GlobalRole::User => "user",
            GlobalRole::Readonly => "readonly",
        }
    }
}

impl core::fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlobalRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(GlobalRole::Admin),
            "user" => Ok(GlobalRole::User),
            "readonly" => Ok(GlobalRole::Readonly),
            other => Err(DomainError::validation(format!(
                "unknown global role '{other}'"
            ))),
        }
    }
}
