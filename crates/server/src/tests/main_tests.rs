use super::*;
use axum::{body, body::Body, http::Request};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> Router {
    build_router(Arc::new(AppState {
        api: ApiContext::new(FixtureStore::default()),
    }))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

#[tokio::test]
async fn health_reports_healthy() {
    let request = Request::get("/health").body(Body::empty()).expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse =
        serde_json::from_value(json_body(response).await).expect("dto");
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn scenario_list_and_document_routes_work() {
    let app = test_app();

    let request = Request::get("/api/scenarios").body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let list: ScenarioListResponse =
        serde_json::from_value(json_body(response).await).expect("dto");
    assert_eq!(list.scenarios.len(), 4);
    assert_eq!(list.scenarios[0].id.as_str(), "baseline");

    let request = Request::get("/api/scenario/scenario2")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let document = json_body(response).await;
    assert_eq!(document["id"], "scenario2");
    assert_eq!(document["task_count"], 8);
}

#[tokio::test]
async fn unknown_scenario_returns_api_error() {
    let request = Request::get("/api/scenario/scenario9")
        .body(Body::empty())
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: ApiError = serde_json::from_value(json_body(response).await).expect("dto");
    assert_eq!(error.error, "unknown scenario 'scenario9'");
}

#[tokio::test]
async fn unknown_path_returns_not_found_body() {
    let request = Request::get("/api/nope").body(Body::empty()).expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({ "error": "Not found" }));
}

#[tokio::test]
async fn legacy_routes_serve_data_and_tasks() {
    let request = Request::get("/scenario1").body(Body::empty()).expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let document = json_body(response).await;
    assert_eq!(document["data"], document["tasks"]);
    assert_eq!(document["tasks"].as_array().map(Vec::len), Some(8));
}

#[tokio::test]
async fn team_tasks_accept_query_filters() {
    let uri = "/api/team/Mechanic%20Team%201/tasks?scenario=baseline&shift=1st&limit=10";
    let request = Request::get(uri)
        .body(Body::empty())
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let document = json_body(response).await;
    assert_eq!(document["team"], "Mechanic Team 1");
    assert_eq!(document["tasks"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn assign_then_export_includes_mechanic() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/assign_task",
            json!({ "taskId": "E_11", "mechanicId": "M_7", "scenario": "baseline" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::get("/api/export/baseline")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"baseline_schedule.csv\""
    );
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let csv = String::from_utf8(bytes.to_vec()).expect("utf8");
    let first = csv.lines().nth(1).expect("row");
    assert!(first.starts_with("E_11,Production,Mechanic Team 1,M_7,"));
}

#[tokio::test]
async fn generate_assignments_and_simulation_routes_work() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/team/Quality%20Team%201/generate_assignments",
            json!({ "scenario": "baseline", "presentMechanics": ["M_1"] }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let document = json_body(response).await;
    assert_eq!(document["assignments"].as_array().map(Vec::len), Some(2));

    let response = app
        .oneshot(post_json(
            "/api/simulate_priority",
            json!({ "scenario": "scenario1", "boost": "E_23" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let document = json_body(response).await;
    assert_eq!(document["parameters"], json!({ "boost": "E_23" }));
}

#[tokio::test]
async fn late_parts_route_reports_impact() {
    let request = Request::get("/api/late_parts_impact/baseline")
        .body(Body::empty())
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["late_parts"], 1);
}

#[test]
fn api_error_codes_map_to_statuses() {
    assert_eq!(
        status_for(&ApiError::new(ErrorCode::Validation, "bad")),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status_for(&ApiError::new(ErrorCode::NotFound, "gone")),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        status_for(&ApiError::new(ErrorCode::Internal, "boom")),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
