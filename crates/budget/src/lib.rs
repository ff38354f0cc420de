//! `tallybook-budget` — concrete budgeting entities (categories, accounts)
//! built on the generic repository.

pub mod account;
pub mod category;

pub use account::{Account, AccountKind, AccountStore, CreateAccount, UpdateAccount};
pub use category::{Category, CategoryStore, CreateCategory, UpdateCategory};
