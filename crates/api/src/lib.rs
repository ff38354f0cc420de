//! TallyBook HTTP API.
//!
//! Request pipeline: bearer auth (JWT) → workspace membership resolution →
//! per-handler permission guard → domain service. Every failure surfaces as
//! a JSON body with a stable machine-readable code.

pub mod app;
pub mod context;
pub mod guards;
pub mod middleware;
