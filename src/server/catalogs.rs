use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::config::CatalogConfig;
use crate::server::AppState;
use crate::server::dto::{CatalogResponse, CreateCatalogRequest, EnvironmentParams, RefreshResponse};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::CatalogKey;

pub async fn list_catalogs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let catalogs = state.store.list_catalogs().map_err(ApiError::from)?;

    let data: Vec<_> = catalogs
        .into_iter()
        .map(|catalog| {
            let refresh_state = state.coordinator.state(&catalog.key());
            CatalogResponse::new(catalog, refresh_state)
        })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(data)))
}

pub async fn create_catalog(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCatalogRequest>,
) -> impl IntoResponse {
    let mut config = CatalogConfig::new(req.url);
    if let Some(branch) = req.branch {
        config = config.with_branch(branch);
    }
    if let Some(environment_id) = req.environment_id {
        config = config.with_environment(environment_id);
    }

    let catalog = state.coordinator.register_catalog(&req.name, &config)?;
    let refresh_state = state.coordinator.state(&catalog.key());

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(CatalogResponse::new(catalog, refresh_state))),
    ))
}

pub async fn refresh_catalog(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let results = state.coordinator.refresh_now(&name).await?;

    let data: Vec<RefreshResponse> = results.into_iter().map(RefreshResponse::from).collect();
    let status = if data.iter().all(|r| r.status == "skipped") {
        StatusCode::CONFLICT
    } else {
        StatusCode::OK
    };

    Ok::<_, ApiError>((status, Json(ApiResponse::success(data))))
}

pub async fn delete_catalog(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<EnvironmentParams>,
) -> impl IntoResponse {
    let key = CatalogKey::new(params.environment_id(), name);
    state.coordinator.remove_catalog(&key)?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<EnvironmentParams>,
) -> impl IntoResponse {
    let templates = state.query.list_templates(params.environment_id(), &name)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(templates)))
}
