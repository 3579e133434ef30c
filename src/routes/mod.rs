pub mod auth;
pub mod resources;

use axum::routing::{get, post};
use axum::Router;

use crate::models::{Client, Project, Resource, Service};
use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/auth/login", post(auth::login))
        // Collections
        .merge(resource_routes::<Project>())
        .merge(resource_routes::<Client>())
        .merge(resource_routes::<Service>())
}

/// `GET/POST /api/{collection}` and `GET/PUT/DELETE /api/{collection}/{id}`.
fn resource_routes<R: Resource>() -> Router<SharedState> {
    let base = format!("/api/{}", R::KIND.collection);
    Router::new()
        .route(
            &base,
            get(resources::list::<R>).post(resources::create::<R>),
        )
        .route(
            &format!("{base}/{{id}}"),
            get(resources::get::<R>)
                .put(resources::update::<R>)
                .delete(resources::delete::<R>),
        )
}
