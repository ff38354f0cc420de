//! Money accounts (checking, savings, cash). Balances are integer cents.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

use tallybook_core::{DomainError, WorkspaceId};
use tallybook_store::{
    decode_text_column, MemoryRecord, MemoryRepository, Nameable, PgQueryAs, PgRecord,
    PgRepository, Record, ScopedRepository, ScopedSearchRepository, SoftDeletable,
    WorkspaceScoped,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
    Cash,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Cash => "cash",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit" => Ok(Self::Credit),
            "cash" => Ok(Self::Cash),
            other => Err(DomainError::validation(format!(
                "unknown account kind '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub kind: AccountKind,
    pub balance_cents: i64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub kind: AccountKind,
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAccount {
    pub name: Option<String>,
    pub kind: Option<AccountKind>,
    pub balance_cents: Option<i64>,
}

impl Record for Account {
    const TABLE: &'static str = "accounts";
    type Create = CreateAccount;
    type Update = UpdateAccount;

    fn id(&self) -> i64 {
        self.id
    }
}

impl SoftDeletable for Account {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

impl Nameable for Account {
    fn name(&self) -> &str {
        &self.name
    }
}

impl WorkspaceScoped for Account {
    fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }
}

impl MemoryRecord for Account {
    fn from_create(id: i64, created_at: DateTime<Utc>, input: &Self::Create) -> Self {
        Self {
            id,
            workspace_id: input.workspace_id,
            name: input.name.clone(),
            kind: input.kind,
            balance_cents: input.balance_cents,
            created_at,
            deleted_at: None,
        }
    }

    fn apply_update(&mut self, input: &Self::Update) {
        if let Some(name) = &input.name {
            self.name = name.clone();
        }
        if let Some(kind) = input.kind {
            self.kind = kind;
        }
        if let Some(balance) = input.balance_cents {
            self.balance_cents = balance;
        }
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Account {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: WorkspaceId::new(row.try_get("workspace_id")?),
            name: row.try_get("name")?,
            kind: decode_text_column(row, "kind")?,
            balance_cents: row.try_get("balance_cents")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl PgRecord for Account {
    const INSERT_COLUMNS: &'static [&'static str] =
        &["workspace_id", "name", "kind", "balance_cents"];

    fn bind_insert<'q>(query: PgQueryAs<'q, Self>, input: &'q Self::Create) -> PgQueryAs<'q, Self> {
        query
            .bind(input.workspace_id.as_i64())
            .bind(&input.name)
            .bind(input.kind.as_str())
            .bind(input.balance_cents)
    }

    fn update_columns(input: &Self::Update) -> Vec<&'static str> {
        let mut columns = Vec::new();
        if input.name.is_some() {
            columns.push("name");
        }
        if input.kind.is_some() {
            columns.push("kind");
        }
        if input.balance_cents.is_some() {
            columns.push("balance_cents");
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
        if let Some(kind) = input.kind {
            query = query.bind(kind.as_str());
        }
        if let Some(balance) = input.balance_cents {
            query = query.bind(balance);
        }
        query
    }
}

/// Storage surface account routes work against. Listings and lookups go
/// through the workspace-scoped operations.
pub trait AccountStore:
    ScopedRepository<Account> + ScopedSearchRepository<Account> + Send + Sync
{
}

impl AccountStore for MemoryRepository<Account> {}
impl AccountStore for PgRepository<Account> {}
