use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use common::types::FailureEntry;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/admin/failures", get(list_failures).delete(clear_failures))
        .route(
            "/v1/admin/rate-limits/{limit_type}/{identity}",
            delete(reset_rate_limit),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureListResponse {
    items: Vec<FailureEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetResponse {
    status: &'static str,
    limit_type: String,
    identity: String,
}

async fn list_failures(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<FailureListResponse>> {
    let items = state.failure_log.list(params.limit).await.map_err(|err| {
        error!(error = %err, "listing failure log");
        AppError::Unavailable.with_request_id(&request_id.0)
    })?;
    Ok(Json(FailureListResponse { items }))
}

async fn clear_failures(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<StatusResponse>> {
    state.failure_log.clear().await.map_err(|err| {
        error!(error = %err, "clearing failure log");
        AppError::Unavailable.with_request_id(&request_id.0)
    })?;
    info!(request_id = %request_id.0, "failure log cleared");
    Ok(Json(StatusResponse { status: "cleared" }))
}

async fn reset_rate_limit(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((limit_type, identity)): Path<(String, String)>,
) -> ApiResult<Json<ResetResponse>> {
    if limit_type.contains(':') || identity.trim().is_empty() {
        return Err(AppError::BadRequest("invalid limit type or identity".to_string())
            .with_request_id(&request_id.0));
    }

    state
        .limiter
        .reset(&identity, &limit_type)
        .await
        .map_err(|err| {
            error!(error = %err, "resetting rate limit");
            AppError::Unavailable.with_request_id(&request_id.0)
        })?;
    info!(%limit_type, %identity, "rate limit reset");

    Ok(Json(ResetResponse {
        status: "reset",
        limit_type,
        identity,
    }))
}
