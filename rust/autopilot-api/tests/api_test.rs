//! End-to-end tests against the full router with an in-memory store.

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use autopilot_api::AppState;
use autopilot_api::config::AppConfig;
use autopilot_api::domain::{Content, GeneratedArticle};
use autopilot_api::gateway::auth::generate_jwt;
use autopilot_api::server::{build_router, create_state};

const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough";
const CRON_SECRET: &str = "test-cron-secret";

fn test_config(cron_secret: Option<&str>) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.path = ":memory:".to_string();
    config.gateway.jwt_secret = Some(JWT_SECRET.to_string());
    config.gateway.cron_secret = cron_secret.map(str::to_string);
    config
}

async fn setup(cron_secret: Option<&str>) -> (TestServer, AppState) {
    let state = create_state(test_config(cron_secret)).await.unwrap();
    let server = TestServer::new(build_router(state.clone())).unwrap();
    (server, state)
}

fn token_for(tenant: &str) -> String {
    generate_jwt("user-1", Some(tenant), vec![], JWT_SECRET, 3600).unwrap()
}

async fn create_project(server: &TestServer, token: &str, wordpress: bool) -> String {
    let mut body = json!({ "name": "Blog" });
    if wordpress {
        body["wordpress"] = json!({
            "baseUrl": "https://blog.example.com",
            "username": "editor",
            "appPassword": "abcd efgh"
        });
    }
    let response = server
        .post("/api/v1/projects")
        .authorization_bearer(token)
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_ready() {
    let (server, _state) = setup(None).await;

    let health = server.get("/health").await;
    health.assert_status_ok();
    assert_eq!(health.json::<Value>()["status"], "ok");

    let ready = server.get("/ready").await;
    ready.assert_status_ok();
    let body = ready.json::<Value>();
    assert_eq!(body["database"], true);
    assert_eq!(body["cronEnabled"], false);
}

#[tokio::test]
async fn test_tenant_routes_require_jwt() {
    let (server, _state) = setup(None).await;

    server
        .get("/api/v1/projects")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/v1/projects")
        .authorization_bearer("not-a-jwt")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_disabled_without_secret() {
    let (server, _state) = setup(None).await;

    let response = server
        .post("/api/cron/autopilot")
        .authorization_bearer("anything")
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cron_rejects_wrong_secret() {
    let (server, _state) = setup(Some(CRON_SECRET)).await;

    server
        .post("/api/cron/autopilot")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/api/cron/autopilot")
        .authorization_bearer("wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_with_nothing_due() {
    let (server, _state) = setup(Some(CRON_SECRET)).await;

    let response = server
        .post("/api/cron/autopilot")
        .authorization_bearer(CRON_SECRET)
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["processed"], 0);
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn test_schedule_crud_is_tenant_scoped() {
    let (server, _state) = setup(None).await;
    let alice = token_for("tenant-a");
    let bob = token_for("tenant-b");
    let project_id = create_project(&server, &alice, false).await;

    let article = server
        .post(&format!("/api/v1/projects/{project_id}/articles"))
        .authorization_bearer(&alice)
        .json(&json!({ "title": "First post", "focusKeyword": "rust" }))
        .await;
    article.assert_status(StatusCode::CREATED);
    let article_id = article.json::<Value>()["id"].as_str().unwrap().to_string();

    let created = server
        .post("/api/v1/schedules")
        .authorization_bearer(&alice)
        .json(&json!({
            "projectId": project_id,
            "name": "Morning",
            "frequency": "daily",
            "timeOfDay": "09:00",
            "articleIds": [article_id]
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let schedule = created.json::<Value>();
    let schedule_id = schedule["id"].as_str().unwrap().to_string();
    assert_eq!(schedule["frequency"], "once-daily");
    assert_eq!(schedule["isActive"], true);

    // Attached articles move to the queue.
    let article = server
        .get(&format!("/api/v1/articles/{article_id}"))
        .authorization_bearer(&alice)
        .await;
    assert_eq!(article.json::<Value>()["status"], "queued");

    let path = format!("/api/v1/schedules/{schedule_id}");
    server
        .get(&path)
        .authorization_bearer(&bob)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&path)
        .authorization_bearer(&bob)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let patched = server
        .patch(&path)
        .authorization_bearer(&alice)
        .json(&json!({ "name": "Evening", "timeOfDay": "18:30" }))
        .await;
    patched.assert_status_ok();
    let patched = patched.json::<Value>();
    assert_eq!(patched["name"], "Evening");
    assert_eq!(patched["timeOfDay"], "18:30");

    let listed = server
        .get("/api/v1/schedules")
        .authorization_bearer(&bob)
        .await;
    assert_eq!(listed.json::<Value>(), json!([]));

    server
        .delete(&path)
        .authorization_bearer(&alice)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&path)
        .authorization_bearer(&alice)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_schedule_rejects_foreign_articles() {
    let (server, _state) = setup(None).await;
    let alice = token_for("tenant-a");
    let bob = token_for("tenant-b");
    let alice_project = create_project(&server, &alice, false).await;
    let bob_project = create_project(&server, &bob, false).await;

    let article = server
        .post(&format!("/api/v1/projects/{bob_project}/articles"))
        .authorization_bearer(&bob)
        .json(&json!({ "title": "Bob's post" }))
        .await;
    let bob_article = article.json::<Value>()["id"].as_str().unwrap().to_string();

    let response = server
        .post("/api/v1/schedules")
        .authorization_bearer(&alice)
        .json(&json!({
            "projectId": alice_project,
            "name": "Sneaky",
            "frequency": "weekly",
            "timeOfDay": "09:00",
            "dayOfWeek": 1,
            "articleIds": [bob_article]
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "validation_error");
}

#[tokio::test]
async fn test_delete_writing_article_only_when_stale() {
    let (server, state) = setup(None).await;
    let token = token_for("tenant-a");
    let project_id = create_project(&server, &token, false).await;

    let created = server
        .post(&format!("/api/v1/projects/{project_id}/articles"))
        .authorization_bearer(&token)
        .json(&json!({ "title": "Stuck post" }))
        .await;
    let article_id = created.json::<Value>()["id"].as_str().unwrap().to_string();

    let mut article = state
        .articles
        .get_article("tenant-a", &article_id)
        .await
        .unwrap()
        .unwrap();
    article.start_writing().unwrap();
    state.articles.update_article(&article).await.unwrap();

    let path = format!("/api/v1/articles/{article_id}");
    server
        .delete(&path)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    article.updated_at = Utc::now() - Duration::hours(1);
    state.articles.update_article(&article).await.unwrap();
    server
        .delete(&path)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_grant_then_read_balance() {
    let (server, _state) = setup(Some(CRON_SECRET)).await;
    let token = token_for("tenant-a");

    let initial = server
        .get("/api/v1/credits")
        .authorization_bearer(&token)
        .await;
    initial.assert_status_ok();
    assert_eq!(initial.json::<Value>()["topUpCredits"], 0);

    server
        .post("/api/internal/credits/grant")
        .authorization_bearer(CRON_SECRET)
        .json(&json!({ "tenantId": "tenant-a", "amount": 25, "type": "topup" }))
        .await
        .assert_status_ok();

    let balance = server
        .get("/api/v1/credits")
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    assert_eq!(balance["topUpCredits"], 25);
    assert_eq!(balance["totalCreditsUsed"], 0);

    let transactions = server
        .get("/api/v1/credits/transactions")
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    assert_eq!(transactions.as_array().unwrap().len(), 1);
    assert_eq!(transactions[0]["amount"], 25);
}

#[tokio::test]
async fn test_grant_rejects_usage_type() {
    let (server, _state) = setup(Some(CRON_SECRET)).await;

    let response = server
        .post("/api/internal/credits/grant")
        .authorization_bearer(CRON_SECRET)
        .json(&json!({ "tenantId": "tenant-a", "amount": 5, "type": "usage" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_grant_does_not_flip_unlimited() {
    let (server, _state) = setup(Some(CRON_SECRET)).await;
    let token = token_for("tenant-a");

    let response = server
        .post("/api/internal/credits/grant")
        .authorization_bearer(CRON_SECRET)
        .json(&json!({ "tenantId": "tenant-a", "amount": 0, "type": "topup", "unlimited": true }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let balance = server
        .get("/api/v1/credits")
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    assert_eq!(balance["isUnlimited"], false);

    let flag_only = server
        .post("/api/internal/credits/grant")
        .authorization_bearer(CRON_SECRET)
        .json(&json!({ "tenantId": "tenant-a", "unlimited": true }))
        .await;
    flag_only.assert_status_ok();
    let body = flag_only.json::<Value>();
    assert_eq!(body["transaction"], Value::Null);
    assert_eq!(body["balance"]["isUnlimited"], true);
}

#[tokio::test]
async fn test_publish_without_credits_is_payment_required() {
    let (server, state) = setup(None).await;
    let token = token_for("tenant-a");
    let project_id = create_project(&server, &token, true).await;

    let content = Content::new(
        "tenant-a",
        &project_id,
        "article-1",
        GeneratedArticle {
            title: "Title".to_string(),
            content: "<p>Body</p>".to_string(),
            meta_description: String::new(),
            excerpt: String::new(),
        },
    );
    state.contents.create_content(&content).await.unwrap();

    let response = server
        .post("/api/v1/content/publish")
        .authorization_bearer(&token)
        .json(&json!({ "contentId": content.id, "projectId": project_id }))
        .await;
    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "insufficient_credits");
    assert_eq!(body["required"], 10);
    assert_eq!(body["available"], 0);
}

#[tokio::test]
async fn test_project_response_hides_app_password() {
    let (server, _state) = setup(None).await;
    let token = token_for("tenant-a");
    let project_id = create_project(&server, &token, true).await;

    let response = server
        .get(&format!("/api/v1/projects/{project_id}"))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("blog.example.com"));
    assert!(!text.contains("abcd efgh"));
}
