use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use cms_backend::config::{
    AdminCredentials, Config, Environment, MongoConfig, StorageBackend,
};
use cms_backend::db::file::FileStore;
use cms_backend::db::Store;

pub const ADMIN_EMAIL: &str = "admin@test.com";
pub const ADMIN_PASSWORD: &str = "password123";
pub const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough";

/// A running test server backed by a throwaway data directory.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub data_dir: PathBuf,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Login and return the response body + status.
    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.post(
            "/api/auth/login",
            None,
            &json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Login as the configured admin, return the bearer token.
    pub async fn token(&self) -> String {
        let (body, status) = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> (Value, StatusCode) {
        let mut req = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Create a record, asserting success, and return its `data`.
    pub async fn create(&self, collection: &str, token: &str, body: &Value) -> Value {
        let (resp, status) = self
            .post(&format!("/api/{collection}"), Some(token), body)
            .await;
        assert_eq!(status, StatusCode::OK, "create {collection} failed: {resp}");
        resp["data"].clone()
    }
}

pub fn test_config(data_dir: PathBuf, environment: Environment) -> Config {
    Config {
        storage: StorageBackend::File,
        mongodb: MongoConfig {
            uri: None,
            database: None,
            max_retries: 0,
        },
        data_dir,
        jwt_secret: JWT_SECRET.to_string(),
        admin: AdminCredentials {
            email: Some(ADMIN_EMAIL.to_string()),
            password: Some(ADMIN_PASSWORD.to_string()),
            password_hash: None,
        },
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        environment,
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
    }
}

pub fn temp_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("cms_test_{}", Uuid::now_v7().simple()))
}

/// Spawn a development-mode app on a fresh file store.
pub async fn spawn_app() -> TestApp {
    let data_dir = temp_data_dir();
    let store = FileStore::open(&data_dir)
        .await
        .expect("Failed to open file store");
    spawn_with(test_config(data_dir, Environment::Development), Arc::new(store)).await
}

/// Spawn an app with an explicit config and store.
pub async fn spawn_with(config: Config, store: Arc<dyn Store>) -> TestApp {
    let data_dir = config.data_dir.clone();
    let (app, _state) = cms_backend::build_app(config, store).expect("Failed to build app");

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        client: Client::new(),
        data_dir,
    }
}

/// Remove the test data directory.
pub async fn cleanup(app: TestApp) {
    let _ = tokio::fs::remove_dir_all(&app.data_dir).await;
}
