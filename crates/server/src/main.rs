use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use shared::{
    domain::{ScenarioId, TeamName},
    error::{ApiError, ErrorCode},
    protocol::{
        AssignTaskRequest, Document, GenerateAssignmentsRequest, HealthResponse,
        ScenarioListResponse, SimulatePriorityRequest,
    },
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{error, info};

mod api;
mod app_state;
mod config;
mod fixtures;

use api::{ApiContext, TeamTaskQuery};
use app_state::AppState;
use config::load_settings;
use fixtures::{FixtureStore, BUILTIN_SCENARIOS};

const MAX_BODY_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let fixtures = FixtureStore::new(settings.fixtures_dir.clone());
    match fixtures.dir() {
        Some(dir) => info!(dir = %dir.display(), "serving scenario fixtures"),
        None => info!("no fixtures directory configured; serving built-in sample scenarios"),
    }

    let state = AppState {
        api: ApiContext::new(fixtures),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/scenarios", get(http_list_scenarios))
        .route("/api/scenario/:scenario", get(http_scenario))
        .route("/api/team/:team/tasks", get(http_team_tasks))
        .route(
            "/api/team/:team/generate_assignments",
            post(http_generate_assignments),
        )
        .route("/api/assign_task", post(http_assign_task))
        .route("/api/late_parts_impact/:scenario", get(http_late_parts_impact))
        .route("/api/simulate_priority", post(http_simulate_priority))
        .route("/api/export/:scenario", get(http_export));
    for (scenario, _) in BUILTIN_SCENARIOS {
        router = router.route(&format!("/{scenario}"), get(http_legacy_scenario));
    }
    router
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn status_for(error: &ApiError) -> StatusCode {
    match error.code {
        Some(ErrorCode::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorCode::Validation) => StatusCode::BAD_REQUEST,
        Some(ErrorCode::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(&error);
    if status.is_server_error() {
        error!(error = %error.error, "request failed");
    }
    (status, Json(error))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: Utc::now(),
    })
}

async fn not_found() -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError::not_found()))
}

async fn http_list_scenarios(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ScenarioListResponse>> {
    api::list_scenarios(&state.api).await.map(Json).map_err(reject)
}

async fn http_scenario(
    State(state): State<Arc<AppState>>,
    Path(scenario): Path<ScenarioId>,
) -> ApiResult<Json<Document>> {
    api::scenario_document(&state.api, &scenario)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_legacy_scenario(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> ApiResult<Json<Document>> {
    let scenario = ScenarioId::new(uri.path().trim_start_matches('/'));
    api::legacy_document(&state.api, &scenario)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_team_tasks(
    State(state): State<Arc<AppState>>,
    Path(team): Path<TeamName>,
    Query(query): Query<TeamTaskQuery>,
) -> ApiResult<Json<Document>> {
    api::team_tasks(&state.api, &team, query)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_generate_assignments(
    State(state): State<Arc<AppState>>,
    Path(team): Path<TeamName>,
    Json(req): Json<GenerateAssignmentsRequest>,
) -> ApiResult<Json<Document>> {
    api::generate_assignments(&state.api, &team, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_assign_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssignTaskRequest>,
) -> ApiResult<Json<Document>> {
    api::assign_task(&state.api, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_late_parts_impact(
    State(state): State<Arc<AppState>>,
    Path(scenario): Path<ScenarioId>,
) -> ApiResult<Json<Document>> {
    api::late_parts_impact(&state.api, &scenario)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_simulate_priority(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulatePriorityRequest>,
) -> ApiResult<Json<Document>> {
    api::simulate_priority(&state.api, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_export(
    State(state): State<Arc<AppState>>,
    Path(scenario): Path<ScenarioId>,
) -> ApiResult<impl IntoResponse> {
    let csv = api::export_csv(&state.api, &scenario)
        .await
        .map_err(reject)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{scenario}_schedule.csv\""))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok((StatusCode::OK, headers, csv))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
