use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use gatekeeper_api::app::services::services_for_store;
use gatekeeper_auth::{JwtClaims, Role};
use gatekeeper_core::UserId;
use gatekeeper_infra::{FallbackCatalog, GatekeeperConfig, InMemoryStore};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

const JWT_SECRET: &str = "test-secret";
const ADMIN: i64 = 1;
const STAFF: i64 = 2;
const TARGET: i64 = 42;

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::seeded(
            &FallbackCatalog::default(),
            [
                (UserId::new(ADMIN), Role::ADMIN),
                (UserId::new(STAFF), Role::new("staff")),
                (UserId::new(TARGET), Role::new("staff")),
            ],
        ));
        let config = GatekeeperConfig::from_lookup(|_| None).expect("default config");
        let services = services_for_store(store.clone(), &config);

        // Same router as prod, bound to an ephemeral port.
        let app = gatekeeper_api::app::build_app(JWT_SECRET.to_string(), services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, store, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, user_id: i64, role: Role) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(user_id),
        role,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn admin_token() -> String {
    mint_jwt(JWT_SECRET, ADMIN, Role::ADMIN)
}

async fn grant_ids(client: &reqwest::Client, srv: &TestServer, user: i64) -> (Vec<i64>, bool) {
    let res = client
        .get(srv.url(&format!("/users/{user}/permissions")))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let ids = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["permission_id"].as_i64().unwrap())
        .collect();
    (ids, body["degraded"].as_bool().unwrap())
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/permissions")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let forged = mint_jwt("other-secret", ADMIN, Role::ADMIN);
    let res = client
        .get(srv.url("/permissions"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let srv = TestServer::spawn().await;
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(ADMIN),
        role: Role::ADMIN,
        issued_at: now - ChronoDuration::hours(2),
        expires_at: now - ChronoDuration::hours(1),
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(JWT_SECRET, STAFF, Role::new("staff"));

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], STAFF);
    assert_eq!(body["role"], "staff");
    assert_eq!(body["is_admin"], false);
}

#[tokio::test]
async fn non_admin_is_forbidden() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, STAFF, Role::new("staff"));

    let res = client
        .post(srv.url(&format!("/users/{TARGET}/permissions")))
        .bearer_auth(&token)
        .json(&json!({ "permission_id": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url(&format!("/users/{TARGET}/permissions")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    assert!(srv.store.grants().unwrap().is_empty());
}

#[tokio::test]
async fn assign_list_revoke_flow() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token();

    let res = client
        .post(srv.url(&format!("/users/{TARGET}/permissions")))
        .bearer_auth(&token)
        .json(&json!({ "permission_id": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(grant_ids(&client, &srv, TARGET).await, (vec![3], false));

    // Duplicate grant.
    let res = client
        .post(srv.url(&format!("/users/{TARGET}/permissions")))
        .bearer_auth(&token)
        .json(&json!({ "permissionId": "3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "already_granted");

    // Revoking something never granted.
    let res = client
        .delete(srv.url(&format!("/users/{TARGET}/permissions/1")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .delete(srv.url(&format!("/users/{TARGET}/permissions/3")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(grant_ids(&client, &srv, TARGET).await, (vec![], false));
}

#[tokio::test]
async fn unknown_user_or_permission_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token();

    for (user, permission) in [(999, 1), (TARGET, 999)] {
        let res = client
            .post(srv.url(&format!("/users/{user}/permissions")))
            .bearer_auth(&token)
            .json(&json!({ "permission_id": permission }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
    assert!(srv.store.grants().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token();

    let res = client
        .get(srv.url("/users/abc/permissions"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url(&format!("/users/{TARGET}/permissions")))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/permissions"))
        .bearer_auth(&token)
        .json(&json!({ "permission_name": "has space" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn define_permission_then_duplicate() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token();

    let res = client
        .post(srv.url("/permissions"))
        .bearer_auth(&token)
        .json(&json!({ "permission_name": "export_data", "description": "Export data" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["permission_id"], 7);
    assert_eq!(body["permission_name"], "export_data");

    let res = client
        .post(srv.url("/permissions"))
        .bearer_auth(&token)
        .json(&json!({ "name": "export_data" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_name");

    let res = client
        .get(srv.url("/permissions"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["permissions"].as_array().unwrap().len(), 7);
    assert_eq!(body["degraded"], false);
}

#[tokio::test]
async fn store_outage_degrades_reads_and_fails_writes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token();

    let res = client
        .post(srv.url(&format!("/users/{TARGET}/permissions")))
        .bearer_auth(&token)
        .json(&json!({ "permission_id": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    srv.store.set_available(false);

    let res = client
        .get(srv.url("/permissions"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["degraded"], true);
    assert_eq!(body["permissions"].as_array().unwrap().len(), 6);

    assert_eq!(grant_ids(&client, &srv, TARGET).await, (vec![], true));

    let res = client
        .post(srv.url(&format!("/users/{TARGET}/permissions")))
        .bearer_auth(&token)
        .json(&json!({ "permission_id": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client
        .delete(srv.url(&format!("/users/{TARGET}/permissions/2")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client
        .post(srv.url("/permissions"))
        .bearer_auth(&token)
        .json(&json!({ "permission_name": "export_data" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store"]["up"], false);

    srv.store.set_available(true);
    assert_eq!(grant_ids(&client, &srv, TARGET).await, (vec![2], false));
}
