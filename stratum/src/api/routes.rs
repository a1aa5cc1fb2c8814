use super::error_response::{ApiError, ApiResult};
use super::ApiState;
use crate::model::ContainerSpec;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type SharedState = Arc<ApiState>;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

pub fn health_routes() -> Router<SharedState> {
    Router::new().route("/health", get(health)).route("/version", get(version))
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(HealthBody { status: "ok", version: state.version })
}

async fn version(State(state): State<SharedState>) -> impl IntoResponse {
    Json(serde_json::json!({ "version": state.version }))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    all: bool,
}

#[derive(Deserialize)]
pub struct RemoveQuery {
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
pub struct StopQuery {
    timeout_secs: Option<u64>,
}

#[derive(Deserialize)]
pub struct KillQuery {
    signal: Option<i32>,
}

#[derive(Deserialize)]
struct ExecBody {
    command: Vec<String>,
}

#[derive(Serialize)]
struct ExecResponse {
    output: String,
}

pub fn container_routes() -> Router<SharedState> {
    Router::new()
        .route("/containers", get(list_containers).post(create_container))
        .route("/containers/:id", get(get_container).delete(remove_container))
        .route("/containers/:id/start", post(start_container))
        .route("/containers/:id/stop", post(stop_container))
        .route("/containers/:id/kill", post(kill_container))
        .route("/containers/:id/exec", post(exec_container))
        .route("/containers/:id/logs", get(container_logs))
}

async fn list_containers(State(state): State<SharedState>, Query(query): Query<ListQuery>) -> ApiResult<impl IntoResponse> {
    let containers = state.engine.list(query.all).map_err(ApiError::from)?;
    Ok(Json(containers))
}

async fn create_container(State(state): State<SharedState>, Json(spec): Json<ContainerSpec>) -> ApiResult<impl IntoResponse> {
    let container = state.engine.create(spec).await.map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(container)))
}

async fn get_container(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let resolved = state.engine.state().resolve(&id).map_err(ApiError::from)?;
    let container = state.engine.state().load(&resolved).map_err(ApiError::from)?;
    Ok(Json(container))
}

async fn start_container(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let container = state.engine.start(&id).await.map_err(ApiError::from)?;
    Ok(Json(container))
}

async fn stop_container(State(state): State<SharedState>, Path(id): Path<String>, Query(query): Query<StopQuery>) -> ApiResult<impl IntoResponse> {
    let timeout = query.timeout_secs.map(std::time::Duration::from_secs);
    let container = state.engine.stop(&id, timeout).await.map_err(ApiError::from)?;
    Ok(Json(container))
}

async fn kill_container(State(state): State<SharedState>, Path(id): Path<String>, Query(query): Query<KillQuery>) -> ApiResult<impl IntoResponse> {
    let container = state.engine.kill(&id, query.signal).await.map_err(ApiError::from)?;
    Ok(Json(container))
}

async fn remove_container(State(state): State<SharedState>, Path(id): Path<String>, Query(query): Query<RemoveQuery>) -> ApiResult<impl IntoResponse> {
    state.engine.remove(&id, query.force).await.map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn exec_container(State(state): State<SharedState>, Path(id): Path<String>, Json(body): Json<ExecBody>) -> ApiResult<impl IntoResponse> {
    let output = state.engine.exec(&id, &body.command).await.map_err(ApiError::from)?;
    Ok(Json(ExecResponse { output }))
}

async fn container_logs(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let logs = state.engine.logs(&id).await.map_err(ApiError::from)?;
    Ok(logs)
}

#[derive(Deserialize)]
struct PullBody {
    reference: String,
}

pub fn image_routes() -> Router<SharedState> {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/pull", post(pull_image))
        .route("/images/:digest", get(get_image).delete(remove_image))
}

async fn list_images(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let images = state.engine.images().list().map_err(ApiError::from)?;
    Ok(Json(images))
}

async fn pull_image(State(state): State<SharedState>, Json(body): Json<PullBody>) -> ApiResult<impl IntoResponse> {
    let image = state.engine.images().pull(&body.reference).await.map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn get_image(State(state): State<SharedState>, Path(digest): Path<String>) -> ApiResult<impl IntoResponse> {
    let image = state.engine.images().get(&digest).map_err(ApiError::from)?;
    Ok(Json(image))
}

async fn remove_image(State(state): State<SharedState>, Path(digest): Path<String>) -> ApiResult<impl IntoResponse> {
    let referenced = state
        .engine
        .list(true)
        .map_err(ApiError::from)?
        .iter()
        .any(|c| c.image == digest);
    state.engine.images().remove(&digest, referenced).map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
