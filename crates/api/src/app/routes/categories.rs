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
use tallybook_budget::{CreateCategory, UpdateCategory};
use tallybook_store::{FindAllOptions, SearchOptions};

use crate::app::{errors, services::AppServices};
use crate::context::MembershipContext;
use crate::guards;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_category).get(list_categories))
        .route("/search", get(search_categories))
        .route("/slug/:slug", get(get_by_slug))
        .route(
            "/:id",
            get(get_category).patch(update_category).delete(delete_category),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Json(body): Json<CreateCategoryRequest>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Categories, Action::Create),
    ) {
        return resp;
    }

    match services.categories.is_slug_unique(&body.slug, None).await {
        Ok(true) => {}
        Ok(false) => {
            return errors::json_error(
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("slug '{}' is already in use", body.slug),
            );
        }
        Err(e) => return errors::domain_error_response(&e),
    }

    match services
        .categories
        .create(CreateCategory {
            workspace_id: membership.workspace_id(),
            name: body.name,
            slug: body.slug,
            color: body.color,
        })
        .await
    {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Query(options): Query<FindAllOptions>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Categories, Action::Read),
    ) {
        return resp;
    }
    match services
        .categories
        .find_by_workspace(membership.workspace_id(), options)
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn search_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Query(query): Query<SearchQuery>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Categories, Action::Read),
    ) {
        return resp;
    }
    match services
        .categories
        .search_in_workspace(membership.workspace_id(), &query.q, SearchOptions::default())
        .await
    {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn get_by_slug(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Categories, Action::Read),
    ) {
        return resp;
    }
    match services.categories.find_by_slug(&slug).await {
        // a slug from another workspace is as absent as no slug at all
        Ok(Some(category)) if category.workspace_id == membership.workspace_id() => {
            (StatusCode::OK, Json(category)).into_response()
        }
        Ok(_) => errors::json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "category not found"),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Categories, Action::Read),
    ) {
        return resp;
    }
    match services
        .categories
        .find_in_workspace(membership.workspace_id(), id)
        .await
    {
        Ok(category) => (StatusCode::OK, Json(category)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategory>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Categories, Action::Update),
    ) {
        return resp;
    }

    // assert the row is ours before any write
    if let Err(e) = services
        .categories
        .find_in_workspace(membership.workspace_id(), id)
        .await
    {
        return errors::domain_error_response(&e);
    }

    if let Some(slug) = &body.slug {
        match services.categories.is_slug_unique(slug, Some(id)).await {
            Ok(true) => {}
            Ok(false) => {
                return errors::json_error(
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("slug '{slug}' is already in use"),
                );
            }
            Err(e) => return errors::domain_error_response(&e),
        }
    }

    match services.categories.update(id, body).await {
        Ok(category) => (StatusCode::OK, Json(category)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}

/// Soft-deletes and archives the slug so the name can be reused right away.
pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(membership): Extension<MembershipContext>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    if let Err(resp) = guards::require_permission(
        &membership,
        Permission::new(Resource::Categories, Action::Delete),
    ) {
        return resp;
    }
    if let Err(e) = services
        .categories
        .find_in_workspace(membership.workspace_id(), id)
        .await
    {
        return errors::domain_error_response(&e);
    }
    match services.categories.soft_delete_with_slug_archive(id).await {
        Ok(category) => (StatusCode::OK, Json(category)).into_response(),
        Err(e) => errors::domain_error_response(&e),
    }
}
