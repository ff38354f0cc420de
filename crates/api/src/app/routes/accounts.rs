use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use tallybook_auth::{Action, Permission, Resource};
use tallybook_budget::{AccountKind, CreateAccount, UpdateAccount};
use tallybook_store::FindAllOptions;

use crate::app::{errors, services::AppServices};
use crate::context::MembershipContext;
use crate::guards;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_account).get(list_accounts))
        .route("/bulk", post(bulk_import))
        .route(
            "/:id",
            get(get_account).patch(update_account).delete(delete_account),
        )
}

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub balance_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    pub accounts: Vec<AccountRequest>,
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Json(body): Json<AccountRequest>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Accounts, Action::Create),
    ) {
        return resp;
    }
    match services
        .accounts
        .create(CreateAccount {
            workspace_id: membership.workspace_id(),
            name: body.name,
            kind: body.kind,
            balance_cents: body.balance_cents,
        })
        .await
    {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

/// Batch import, e.g. from a bank export. Editor-and-up only; the whole
/// batch is rejected before any write if it exceeds the store's bulk limit.
pub async fn bulk_import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Json(body): Json<BulkImportRequest>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_editor(&membership) {
        return resp;
    }

    let inputs = body
        .accounts
        .into_iter()
        .map(|a| CreateAccount {
            workspace_id: membership.workspace_id(),
            name: a.name,
            kind: a.kind,
            balance_cents: a.balance_cents,
        })
        .collect();

    match services.accounts.bulk_create(inputs).await {
        Ok(accounts) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "items": accounts })),
        )
            .into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Query(options): Query<FindAllOptions>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Accounts, Action::Read),
    ) {
        return resp;
    }
    match services
        .accounts
        .find_by_workspace(membership.workspace_id(), options)
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Accounts, Action::Read),
    ) {
        return resp;
    }
    match services
        .accounts
        .find_in_workspace(membership.workspace_id(), id)
        .await
    {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn update_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateAccount>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Accounts, Action::Update),
    ) {
        return resp;
    }
    // assert the row is ours before any write
    if let Err(e) = services
        .accounts
        .find_in_workspace(membership.workspace_id(), id)
        .await
    {
        return errors::domain_error_response(&e);
    }
    match services.accounts.update(id, body).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn delete_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Accounts, Action::Delete),
    ) {
        return resp;
    }
    if let Err(e) = services
        .accounts
        .find_in_workspace(membership.workspace_id(), id)
        .await
    {
        return errors::domain_error_response(&e);
    }
    match services.accounts.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}
