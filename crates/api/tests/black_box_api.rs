use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use tallybook_auth::{GlobalRole, JwtClaims};
use tallybook_core::{UserId, WorkspaceId};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = tallybook_api::app::build_app(jwt_secret.to_string());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(
    jwt_secret: &str,
    user_id: i64,
    email: &str,
    global_role: GlobalRole,
    workspace_id: Option<WorkspaceId>,
) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(user_id),
        email: email.to_string(),
        global_role,
        workspace_id,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Create a workspace for `user_id` and return its id.
async fn create_workspace(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    slug: &str,
) -> WorkspaceId {
    let res = client
        .post(format!("{}/workspaces", base_url))
        .bearer_auth(token)
        .json(&json!({ "name": "Household", "slug": slug }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    WorkspaceId::new(body["id"].as_i64().unwrap())
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn whoami_reflects_token_claims() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, 7, "me@example.com", GlobalRole::User, None);
    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], 7);
    assert_eq!(body["email"], "me@example.com");
    assert_eq!(body["global_role"], "user");
    assert!(body["workspace_id"].is_null());
}

#[tokio::test]
async fn workspace_routes_require_a_selected_workspace() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, 1, "a@example.com", GlobalRole::User, None);
    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/workspace/categories", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_members_are_forbidden() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let owner_token = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, None);
    let ws = create_workspace(&client, &srv.base_url, &owner_token, "household").await;

    // user 2 holds no membership in the workspace
    let intruder = mint_jwt(jwt_secret, 2, "b@example.com", GlobalRole::User, Some(ws));
    let res = client
        .get(format!("{}/workspace/categories", srv.base_url))
        .bearer_auth(intruder)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "FORBIDDEN");
}

#[tokio::test]
async fn category_lifecycle_with_slug_archive() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let token = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, None);
    let ws = create_workspace(&client, &srv.base_url, &token, "household").await;
    let token = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, Some(ws));

    // create
    let res = client
        .post(format!("{}/workspace/categories", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Rent", "slug": "rent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    // duplicate slug conflicts
    let res = client
        .post(format!("{}/workspace/categories", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Rent 2", "slug": "rent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // lookup by slug
    let res = client
        .get(format!("{}/workspace/categories/slug/rent", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // delete archives the slug
    let res = client
        .delete(format!("{}/workspace/categories/{}", srv.base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let deleted: serde_json::Value = res.json().await.unwrap();
    assert!(deleted["slug"].as_str().unwrap().starts_with("rent-deleted-"));

    // the active slug is gone, and can be claimed again
    let res = client
        .get(format!("{}/workspace/categories/slug/rent", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(format!("{}/workspace/categories", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Rent", "slug": "rent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn invitation_accept_grants_membership() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let owner = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, None);
    let ws = create_workspace(&client, &srv.base_url, &owner, "household").await;
    let owner = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, Some(ws));

    // owner invites an editor
    let res = client
        .post(format!("{}/workspace/invitations", srv.base_url))
        .bearer_auth(&owner)
        .json(&json!({ "email": "friend@example.com", "role": "editor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let invitation: serde_json::Value = res.json().await.unwrap();
    assert_eq!(invitation["status"], "pending");
    let invite_token = invitation["token"].as_str().unwrap().to_string();

    // invitee accepts with a matching email
    let invitee = mint_jwt(jwt_secret, 2, "friend@example.com", GlobalRole::User, None);
    let res = client
        .post(format!("{}/invitations/accept", srv.base_url))
        .bearer_auth(&invitee)
        .json(&json!({ "token": invite_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let membership: serde_json::Value = res.json().await.unwrap();
    assert_eq!(membership["role"], "editor");

    // the same token cannot be used twice
    let res = client
        .post(format!("{}/invitations/accept", srv.base_url))
        .bearer_auth(&invitee)
        .json(&json!({ "token": invite_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // the new editor can now work inside the workspace
    let invitee = mint_jwt(
        jwt_secret,
        2,
        "friend@example.com",
        GlobalRole::User,
        Some(ws),
    );
    let res = client
        .post(format!("{}/workspace/categories", srv.base_url))
        .bearer_auth(&invitee)
        .json(&json!({ "name": "Groceries", "slug": "groceries" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn viewer_may_read_but_not_write() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let owner = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, None);
    let ws = create_workspace(&client, &srv.base_url, &owner, "household").await;
    let owner = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, Some(ws));

    // bring in a viewer via invitation
    let res = client
        .post(format!("{}/workspace/invitations", srv.base_url))
        .bearer_auth(&owner)
        .json(&json!({ "email": "viewer@example.com", "role": "viewer" }))
        .send()
        .await
        .unwrap();
    let invitation: serde_json::Value = res.json().await.unwrap();
    let invite_token = invitation["token"].as_str().unwrap().to_string();

    let viewer = mint_jwt(jwt_secret, 2, "viewer@example.com", GlobalRole::User, None);
    let res = client
        .post(format!("{}/invitations/accept", srv.base_url))
        .bearer_auth(&viewer)
        .json(&json!({ "token": invite_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let viewer = mint_jwt(
        jwt_secret,
        2,
        "viewer@example.com",
        GlobalRole::User,
        Some(ws),
    );

    // writes are forbidden
    let res = client
        .post(format!("{}/workspace/accounts", srv.base_url))
        .bearer_auth(&viewer)
        .json(&json!({ "name": "Checking", "kind": "checking" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // reads succeed
    let res = client
        .get(format!("{}/workspace/accounts", srv.base_url))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn records_are_invisible_across_workspaces() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    // user 1 owns workspace A holding one category and one account
    let alice = mint_jwt(jwt_secret, 1, "alice@example.com", GlobalRole::User, None);
    let ws_a = create_workspace(&client, &srv.base_url, &alice, "alpha").await;
    let alice = mint_jwt(
        jwt_secret,
        1,
        "alice@example.com",
        GlobalRole::User,
        Some(ws_a),
    );

    let res = client
        .post(format!("{}/workspace/categories", srv.base_url))
        .bearer_auth(&alice)
        .json(&json!({ "name": "Groceries", "slug": "groceries" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let category_id = body["id"].as_i64().unwrap();

    let res = client
        .post(format!("{}/workspace/accounts", srv.base_url))
        .bearer_auth(&alice)
        .json(&json!({ "name": "Checking", "kind": "checking" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let account_id = body["id"].as_i64().unwrap();

    // user 2 owns an unrelated workspace B
    let bob = mint_jwt(jwt_secret, 2, "bob@example.com", GlobalRole::User, None);
    let ws_b = create_workspace(&client, &srv.base_url, &bob, "beta").await;
    let bob = mint_jwt(jwt_secret, 2, "bob@example.com", GlobalRole::User, Some(ws_b));

    // foreign ids look absent: reads, writes, and deletes all 404
    let attempts = [
        client.get(format!(
            "{}/workspace/categories/{category_id}",
            srv.base_url
        )),
        client
            .patch(format!(
                "{}/workspace/categories/{category_id}",
                srv.base_url
            ))
            .json(&json!({ "name": "Hijacked" })),
        client.delete(format!(
            "{}/workspace/categories/{category_id}",
            srv.base_url
        )),
        client.get(format!(
            "{}/workspace/categories/slug/groceries",
            srv.base_url
        )),
        client.get(format!("{}/workspace/accounts/{account_id}", srv.base_url)),
        client.delete(format!("{}/workspace/accounts/{account_id}", srv.base_url)),
    ];
    for attempt in attempts {
        let res = attempt.bearer_auth(&bob).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "NOT_FOUND");
    }

    // listings and search stay workspace-local
    let res = client
        .get(format!("{}/workspace/categories", srv.base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 0);
    assert!(body["data"].as_array().unwrap().is_empty());

    let res = client
        .get(format!("{}/workspace/categories/search?q=groc", srv.base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());

    let res = client
        .get(format!("{}/workspace/accounts", srv.base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 0);

    // workspace A is untouched
    let res = client
        .get(format!(
            "{}/workspace/categories/{category_id}",
            srv.base_url
        ))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_surface_requires_a_global_admin() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let user = mint_jwt(jwt_secret, 1, "user@example.com", GlobalRole::User, None);
    let res = client
        .post(format!("{}/admin/invitations/expire", srv.base_url))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let admin = mint_jwt(jwt_secret, 2, "admin@example.com", GlobalRole::Admin, None);
    let res = client
        .post(format!("{}/admin/invitations/expire", srv.base_url))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["expired"], 0);
}

#[tokio::test]
async fn bulk_account_import_enforces_the_batch_limit() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let token = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, None);
    let ws = create_workspace(&client, &srv.base_url, &token, "household").await;
    let token = mint_jwt(jwt_secret, 1, "owner@example.com", GlobalRole::User, Some(ws));

    let oversized: Vec<_> = (0..1001)
        .map(|i| json!({ "name": format!("acct-{i}"), "kind": "cash" }))
        .collect();
    let res = client
        .post(format!("{}/workspace/accounts/bulk", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "accounts": oversized }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "DATABASE_ERROR");

    let small: Vec<_> = (0..3)
        .map(|i| json!({ "name": format!("acct-{i}"), "kind": "cash" }))
        .collect();
    let res = client
        .post(format!("{}/workspace/accounts/bulk", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "accounts": small }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}
