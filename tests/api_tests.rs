mod common;

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};

use cms_backend::auth::jwt;
use cms_backend::config::{Environment, StorageBackend};
use cms_backend::db::file::FileStore;

fn audit_service() -> Value {
    json!({ "title": "Audit", "description": "...", "icon": "x", "image": "y" })
}

fn tower_project() -> Value {
    json!({
        "title": "Tower",
        "category": "Construction",
        "location": "Riyadh",
        "description": "A tower",
        "client": "Acme",
        "budget": "1M",
        "services": ["design", "build"],
    })
}

// ── Health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let app = common::spawn_app().await;

    let (body, status) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "OK");
    assert_eq!(body["data"]["storage"], "file");

    common::cleanup(app).await;
}

#[tokio::test]
async fn unknown_route_is_enveloped_404() {
    let app = common::spawn_app().await;

    let (body, status) = app.get("/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    common::cleanup(app).await;
}

// ── Login ───────────────────────────────────────────────────────

#[tokio::test]
async fn login_valid_credentials() {
    let app = common::spawn_app().await;

    let (body, status) = app.login(common::ADMIN_EMAIL, common::ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["user"]["email"], common::ADMIN_EMAIL);

    let token = body["data"]["token"].as_str().unwrap();
    let claims = jwt::decode_token(token, common::JWT_SECRET).unwrap();
    assert_eq!(claims.email, common::ADMIN_EMAIL);
    assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);

    common::cleanup(app).await;
}

#[tokio::test]
async fn login_invalid_credentials() {
    let app = common::spawn_app().await;

    for (email, password) in [
        (common::ADMIN_EMAIL, "wrongpassword"),
        ("nobody@test.com", common::ADMIN_PASSWORD),
        ("nobody@test.com", "wrongpassword"),
        ("", ""),
    ] {
        let (body, status) = app.login(email, password).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{email}/{password}");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid credentials");
    }

    common::cleanup(app).await;
}

#[tokio::test]
async fn login_without_fields_is_unauthorized() {
    let app = common::spawn_app().await;

    let (_, status) = app.post("/api/auth/login", None, &json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

// ── Bearer tokens ───────────────────────────────────────────────

#[tokio::test]
async fn create_without_token_is_rejected_and_stores_nothing() {
    let app = common::spawn_app().await;

    let (body, status) = app.post("/api/services", None, &audit_service()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access token required");

    let (list, _) = app.get("/api/services").await;
    assert_eq!(list["data"], json!([]));

    common::cleanup(app).await;
}

#[tokio::test]
async fn invalid_or_expired_token_is_forbidden() {
    let app = common::spawn_app().await;

    let (body, status) = app
        .post("/api/services", Some("not-a-jwt"), &audit_service())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid or expired token");

    let expired = jwt::Claims {
        email: common::ADMIN_EMAIL.to_string(),
        iat: chrono::Utc::now().timestamp() - 3 * 86_400,
        exp: chrono::Utc::now().timestamp() - 2 * 86_400,
    };
    let token = jwt::encode_token(&expired, common::JWT_SECRET).unwrap();
    let (_, status) = app.put("/api/services/anything", &token, &json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let foreign = jwt::encode_token(
        &jwt::Claims::new(common::ADMIN_EMAIL.to_string()),
        "some-other-secret",
    )
    .unwrap();
    let (_, status) = app.delete("/api/services/anything", &foreign).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn update_and_delete_without_token_are_unauthorized() {
    let app = common::spawn_app().await;
    let token = app.token().await;
    let created = app.create("services", &token, &audit_service()).await;
    let path = format!("/api/services/{}", created["id"].as_str().unwrap());

    let resp = app
        .client
        .put(app.url(&path))
        .json(&json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Access token required");

    let resp = app.client.delete(app.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (got, status) = app.get(&path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(got["data"], created);

    common::cleanup(app).await;
}

// ── Services ────────────────────────────────────────────────────

#[tokio::test]
async fn create_service_then_get_returns_same_payload() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let (body, status) = app
        .post("/api/services", Some(&token), &audit_service())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Service created successfully");

    let created = &body["data"];
    let id = created["id"].as_str().unwrap();
    assert!(Regex::new(r"^service-\d+$").unwrap().is_match(id), "{id}");
    assert_eq!(created["title"], "Audit");
    assert_eq!(created["isActive"], true);
    assert!(created["createdAt"].is_string());
    assert_eq!(created["createdAt"], created["updatedAt"]);

    let (got, status) = app.get(&format!("/api/services/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&got["data"], created);

    common::cleanup(app).await;
}

#[tokio::test]
async fn service_lookup_falls_back_to_slug() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let mut payload = audit_service();
    payload["slug"] = json!("audit");
    let created = app.create("services", &token, &payload).await;

    let (got, status) = app.get("/api/services/audit").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(got["data"]["id"], created["id"]);

    common::cleanup(app).await;
}

#[tokio::test]
async fn duplicate_slug_conflicts() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let mut payload = audit_service();
    payload["slug"] = json!("audit");
    app.create("services", &token, &payload).await;

    let (body, status) = app.post("/api/services", Some(&token), &payload).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    common::cleanup(app).await;
}

#[tokio::test]
async fn missing_required_field_is_a_validation_error() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let (body, status) = app
        .post("/api/services", Some(&token), &json!({ "title": "Audit" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Service validation failed"));

    let (list, _) = app.get("/api/services").await;
    assert_eq!(list["data"], json!([]));

    common::cleanup(app).await;
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let resp = app
        .client
        .post(app.url("/api/projects"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);

    common::cleanup(app).await;
}

// ── Projects CRUD ───────────────────────────────────────────────

#[tokio::test]
async fn projects_crud() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    // Create with a caller-chosen id
    let mut payload = tower_project();
    payload["id"] = json!("tower");
    let created = app.create("projects", &token, &payload).await;
    assert_eq!(created["id"], "tower");
    assert_eq!(created["status"], "completed");

    // List
    let (list, status) = app.get("/api/projects").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    // Update
    let (updated, status) = app
        .put(
            "/api/projects/tower",
            &token,
            &json!({ "status": "in-progress" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Project updated successfully");
    assert_eq!(updated["data"]["status"], "in-progress");

    // Delete
    let (deleted, status) = app.delete("/api/projects/tower", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "Project deleted successfully");

    // Verify deleted
    let (body, status) = app.get("/api/projects/tower").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Project not found");

    let (_, status) = app.delete("/api/projects/tower", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

#[tokio::test]
async fn update_is_a_partial_merge() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let created = app.create("projects", &token, &tower_project()).await;
    let id = created["id"].as_str().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    let (body, status) = app
        .put(
            &format!("/api/projects/{id}"),
            &token,
            &json!({ "title": "Tower II", "id": "hijack", "createdAt": "1999-01-01T00:00:00.000Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut updated = body["data"].as_object().unwrap().clone();
    let mut before = created.as_object().unwrap().clone();
    assert_eq!(updated["title"], "Tower II");
    assert_ne!(updated["updatedAt"], before["updatedAt"]);

    for doc in [&mut updated, &mut before] {
        doc.remove("title");
        doc.remove("updatedAt");
    }
    assert_eq!(updated, before);

    common::cleanup(app).await;
}

#[tokio::test]
async fn update_rejects_invalid_values() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let created = app.create("projects", &token, &tower_project()).await;
    let id = created["id"].as_str().unwrap();

    let (_, status) = app
        .put(&format!("/api/projects/{id}"), &token, &json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (got, _) = app.get(&format!("/api/projects/{id}")).await;
    assert_eq!(got["data"]["status"], "completed");

    let (_, status) = app
        .put("/api/projects/missing", &token, &json!({ "title": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

#[tokio::test]
async fn list_is_newest_first() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let mut created = Vec::new();
    for name in ["first", "second", "third", "fourth"] {
        let record = app
            .create("clients", &token, &json!({ "name": name }))
            .await;
        created.push(record["id"].as_str().unwrap().to_string());
    }

    let (list, status) = app.get("/api/clients").await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    created.reverse();
    assert_eq!(listed, created);

    common::cleanup(app).await;
}

#[tokio::test]
async fn generated_ids_are_unique_under_concurrency() {
    let app = Arc::new(common::spawn_app().await);
    let token = app.token().await;

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let app = app.clone();
            let token = token.clone();
            tokio::spawn(async move {
                app.create("clients", &token, &json!({ "name": format!("client {i}") }))
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap()["id"].as_str().unwrap().to_string());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);

    let (list, _) = app.get("/api/clients").await;
    assert_eq!(list["data"].as_array().unwrap().len(), 10);

    if let Ok(app) = Arc::try_unwrap(app) {
        common::cleanup(app).await;
    }
}

// ── Clients ─────────────────────────────────────────────────────

#[tokio::test]
async fn clients_keep_arbitrary_fields() {
    let app = common::spawn_app().await;
    let token = app.token().await;

    let created = app
        .create(
            "clients",
            &token,
            &json!({ "name": "Acme", "logo": "acme.png", "sector": { "main": "energy" } }),
        )
        .await;
    assert!(created["id"].as_str().unwrap().starts_with("client-"));
    assert_eq!(created["sector"]["main"], "energy");

    common::cleanup(app).await;
}

// ── Persistence ─────────────────────────────────────────────────

#[tokio::test]
async fn records_survive_restart() {
    let app = common::spawn_app().await;
    let token = app.token().await;
    let created = app.create("services", &token, &audit_service()).await;

    let store = FileStore::open(&app.data_dir).await.unwrap();
    let restarted = common::spawn_with(
        common::test_config(app.data_dir.clone(), Environment::Development),
        Arc::new(store),
    )
    .await;

    let (got, status) = restarted
        .get(&format!("/api/services/{}", created["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(got["data"], created);

    common::cleanup(app).await;
}

// ── Body limit ──────────────────────────────────────────────────

#[tokio::test]
async fn body_limit_follows_configuration() {
    let data_dir = common::temp_data_dir();
    let store = FileStore::open(&data_dir).await.unwrap();
    let mut config = common::test_config(data_dir, Environment::Development);
    config.max_body_size = 1024;
    let app = common::spawn_with(config, Arc::new(store)).await;
    let token = app.token().await;
    let (body, status) = app
        .post("/api/clients", Some(&token), &json!({ "notes": "x".repeat(8 * 1024) }))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
    common::cleanup(app).await;

    // Above axum's built-in 2 MiB default.
    let notes = "x".repeat(3 * 1024 * 1024);
    let data_dir = common::temp_data_dir();
    let store = FileStore::open(&data_dir).await.unwrap();
    let mut config = common::test_config(data_dir, Environment::Development);
    config.max_body_size = 4 * 1024 * 1024;
    let app = common::spawn_with(config, Arc::new(store)).await;
    let token = app.token().await;
    let created = app
        .create("clients", &token, &json!({ "notes": notes }))
        .await;
    assert_eq!(created["notes"].as_str().unwrap().len(), notes.len());
    common::cleanup(app).await;
}

// ── Error detail ────────────────────────────────────────────────

#[tokio::test]
async fn error_detail_only_outside_production() {
    let app = common::spawn_app().await;
    let (body, _) = app.get("/api/projects/missing").await;
    assert!(body["error"].is_string());
    common::cleanup(app).await;

    let data_dir = common::temp_data_dir();
    let store = FileStore::open(&data_dir).await.unwrap();
    let app = common::spawn_with(
        common::test_config(data_dir, Environment::Production),
        Arc::new(store),
    )
    .await;
    let (body, status) = app.get("/api/projects/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("error").is_none());
    common::cleanup(app).await;
}

// ── Database connectivity ───────────────────────────────────────

#[tokio::test]
async fn missing_mongodb_uri_fails_at_startup() {
    let mut config = common::test_config(common::temp_data_dir(), Environment::Development);
    config.storage = StorageBackend::MongoDb;

    let err = cms_backend::db::open(&config).await.err().unwrap();
    assert!(err.to_string().contains("MONGODB_URI"));
}

#[tokio::test]
async fn unreachable_mongodb_is_service_unavailable() {
    let mut config = common::test_config(common::temp_data_dir(), Environment::Development);
    config.storage = StorageBackend::MongoDb;
    config.mongodb.uri = Some("mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200".to_string());
    config.mongodb.max_retries = 0;

    let store = cms_backend::db::open(&config).await.unwrap();
    let app = common::spawn_with(config, store).await;

    let (body, status) = app.get("/api/projects").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Database connection unavailable");
    assert!(body["error"].as_str().unwrap().contains("Connectivity"));

    // Health does not touch the database.
    let (_, status) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);

    common::cleanup(app).await;
}
