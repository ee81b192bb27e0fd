use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{delete, get, post},
};

use super::{catalogs, versions};
use crate::catalog::{QueryFacade, RefreshCoordinator};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub query: QueryFacade,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            query: QueryFacade::new(Arc::clone(&store)),
            store,
            coordinator,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1-catalog/catalogs",
            get(catalogs::list_catalogs).post(catalogs::create_catalog),
        )
        .route(
            "/v1-catalog/catalogs/{name}",
            delete(catalogs::delete_catalog),
        )
        .route(
            "/v1-catalog/catalogs/{name}/templates",
            get(catalogs::list_templates),
        )
        .route(
            "/v1-catalog/catalogs/{name}/refresh",
            post(catalogs::refresh_catalog),
        )
        .route(
            "/v1-catalog/templates/{catalog}/{template}/versions",
            get(versions::list_versions),
        )
        .route(
            "/v1-catalog/templates/{catalog}/{template}/versions/{revision}",
            get(versions::get_version),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
