use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::error::{ApiError, ErrorCode};
use tokio::net::TcpListener;

use crate::{container::HeadlessContainer, event_bus::DashboardEvent, EventBus, Topic};

#[derive(Clone, Default)]
pub struct Backend {
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl Backend {
    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .expect("hits")
            .get(path)
            .copied()
            .unwrap_or_default()
    }

    fn record(&self, uri: &Uri) {
        *self
            .hits
            .lock()
            .expect("hits")
            .entry(uri.path().to_string())
            .or_default() += 1;
    }
}

type Reply = Result<Json<Value>, (StatusCode, Json<ApiError>)>;

fn failure() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(ErrorCode::Internal, "scheduler crashed")),
    )
}

async fn scenarios(State(backend): State<Backend>, uri: Uri) -> Json<Value> {
    backend.record(&uri);
    Json(json!({ "scenarios": [
        { "id": "baseline", "name": "Baseline", "task_count": 2 },
        { "id": "scenario1", "name": "Scenario 1", "task_count": 2 }
    ] }))
}

async fn scenario(State(backend): State<Backend>, Path(id): Path<String>, uri: Uri) -> Reply {
    backend.record(&uri);
    match id.as_str() {
        "broken" => Err(failure()),
        "slow" => {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(Json(json!({ "id": id, "tasks": [] })))
        }
        "slow-broken" => {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Err(failure())
        }
        _ => Ok(Json(json!({ "id": id, "tasks": [{ "taskId": "E_11" }] }))),
    }
}

async fn late_parts(State(backend): State<Backend>, Path(id): Path<String>, uri: Uri) -> Reply {
    backend.record(&uri);
    Ok(Json(json!({ "scenario": id, "late_parts": 1 })))
}

async fn team_tasks(State(backend): State<Backend>, Path(team): Path<String>, uri: Uri) -> Reply {
    backend.record(&uri);
    Ok(Json(json!({ "team": team, "tasks": [] })))
}

async fn assign(State(backend): State<Backend>, uri: Uri, Json(body): Json<Value>) -> Reply {
    backend.record(&uri);
    if body["taskId"] == "broken" {
        return Err(failure());
    }
    Ok(Json(json!({ "status": "assigned", "request": body })))
}

async fn generate(
    State(backend): State<Backend>,
    Path(team): Path<String>,
    uri: Uri,
    Json(body): Json<Value>,
) -> Reply {
    backend.record(&uri);
    Ok(Json(json!({ "team": team, "scenario": body["scenario"], "assignments": [] })))
}

pub async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/scenarios", get(scenarios))
        .route("/api/scenario/:id", get(scenario))
        .route("/api/late_parts_impact/:id", get(late_parts))
        .route("/api/team/:team/tasks", get(team_tasks))
        .route("/api/team/:team/generate_assignments", post(generate))
        .route("/api/assign_task", post(assign))
        .with_state(backend.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), backend)
}

pub fn record_events(bus: &EventBus, topics: &[Topic]) -> Arc<Mutex<Vec<DashboardEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for topic in topics {
        let log = Arc::clone(&log);
        bus.subscribe(
            *topic,
            move |event| log.lock().expect("events").push(event.clone()),
            None,
        );
    }
    log
}

/// Polls `condition` until it holds or roughly two seconds have passed.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn rendered_id(container: &HeadlessContainer) -> Option<String> {
    container
        .snapshot()
        .rendered
        .and_then(|document| document["scenario"]["id"].as_str().map(str::to_string))
}
