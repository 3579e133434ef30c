pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod seed;
pub mod state;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::identity::ConfiguredAdmin;
use crate::config::Config;
use crate::db::Store;
use crate::middleware::error_detail::expose_error_detail;
use crate::models::IdGenerator;
use crate::response::Envelope;
use crate::state::{AppState, SharedState};

pub fn build_app(config: Config, store: Arc<dyn Store>) -> Result<(Router, SharedState), String> {
    let identity = ConfiguredAdmin::from_config(&config.admin)?;

    let state: SharedState = Arc::new(AppState {
        config,
        store,
        identity: Arc::new(identity),
        ids: IdGenerator::new(),
    });

    let mut router = Router::new()
        .merge(routes::api_routes())
        .route("/health", get(health))
        .fallback(not_found);

    if !state.config.environment.is_production() {
        router = router.layer(axum::middleware::from_fn(expose_error_detail));
    }

    let app = router
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                )),
        )
        .with_state(state.clone());

    Ok((app, state))
}

async fn health(State(state): State<SharedState>) -> Envelope<Value> {
    Envelope::data(json!({ "status": "OK", "storage": state.store.backend() }))
        .with_message("CMS backend is running")
}

async fn not_found() -> (StatusCode, Envelope<()>) {
    (StatusCode::NOT_FOUND, Envelope::failure("Route not found"))
}
