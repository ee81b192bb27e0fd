use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::dto::{EnvironmentParams, VersionResponse};
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path((catalog, template)): Path<(String, String)>,
    Query(params): Query<EnvironmentParams>,
) -> impl IntoResponse {
    let versions = state
        .query
        .list_versions(params.environment_id(), &catalog, &template)?;

    let data: Vec<_> = versions
        .into_iter()
        .map(|v| VersionResponse::new(v, &catalog, &template))
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(data)))
}

pub async fn get_version(
    State(state): State<Arc<AppState>>,
    Path((catalog, template, revision)): Path<(String, String, i64)>,
    Query(params): Query<EnvironmentParams>,
) -> impl IntoResponse {
    let version = state
        .query
        .get_version(params.environment_id(), &catalog, &template, revision)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(VersionResponse::new(
        version, &catalog, &template,
    ))))
}
