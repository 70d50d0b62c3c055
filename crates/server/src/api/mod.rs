use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    domain::{MechanicId, ScenarioId, TaskId, TaskType, TeamName},
    error::{ApiError, ErrorCode},
    protocol::{
        AssignTaskRequest, Document, GenerateAssignmentsRequest, ScenarioListResponse,
        SimulatePriorityRequest,
    },
};
use tracing::info;

use crate::fixtures::FixtureStore;

#[derive(Clone, Default)]
pub struct ApiContext {
    pub fixtures: FixtureStore,
    assignments: Arc<Mutex<HashMap<(ScenarioId, TaskId), MechanicId>>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TeamTaskQuery {
    pub scenario: Option<ScenarioId>,
    pub shift: Option<String>,
    pub limit: Option<usize>,
}

impl ApiContext {
    pub fn new(fixtures: FixtureStore) -> Self {
        Self {
            fixtures,
            assignments: Arc::default(),
        }
    }

    fn assignment(&self, scenario: &ScenarioId, task: &TaskId) -> Option<MechanicId> {
        self.assignments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(scenario.clone(), task.clone()))
            .cloned()
    }

    /// Tasks of `scenario` with any recorded assignment folded in as `mechanic`.
    async fn assigned_tasks(&self, scenario: &ScenarioId) -> Result<Vec<Value>, ApiError> {
        let mut tasks = self.fixtures.tasks(scenario).await?;
        for task in &mut tasks {
            let Some(id) = task.get("taskId").and_then(Value::as_str) else {
                continue;
            };
            if let Some(mechanic) = self.assignment(scenario, &TaskId::new(id)) {
                task["mechanic"] = json!(mechanic);
            }
        }
        Ok(tasks)
    }
}

fn default_scenario(scenario: Option<ScenarioId>) -> ScenarioId {
    scenario.unwrap_or_default()
}

fn task_field<'a>(task: &'a Value, field: &str) -> Option<&'a str> {
    task.get(field).and_then(Value::as_str)
}

pub async fn list_scenarios(ctx: &ApiContext) -> Result<ScenarioListResponse, ApiError> {
    Ok(ScenarioListResponse {
        scenarios: ctx.fixtures.scenarios().await?,
    })
}

pub async fn scenario_document(
    ctx: &ApiContext,
    scenario: &ScenarioId,
) -> Result<Document, ApiError> {
    let tasks = ctx.assigned_tasks(scenario).await?;
    Ok(json!({ "id": scenario, "task_count": tasks.len(), "tasks": tasks }))
}

/// The shape the Gantt chart reads from the bare `/<scenario>` routes.
pub async fn legacy_document(
    ctx: &ApiContext,
    scenario: &ScenarioId,
) -> Result<Document, ApiError> {
    let tasks = ctx.assigned_tasks(scenario).await?;
    Ok(json!({ "data": tasks, "tasks": tasks }))
}

pub async fn team_tasks(
    ctx: &ApiContext,
    team: &TeamName,
    query: TeamTaskQuery,
) -> Result<Document, ApiError> {
    let scenario = default_scenario(query.scenario);
    let tasks: Vec<Value> = ctx
        .assigned_tasks(&scenario)
        .await?
        .into_iter()
        .filter(|task| task_field(task, "team") == Some(team.as_str()))
        .filter(|task| {
            query
                .shift
                .as_deref()
                .map_or(true, |shift| task_field(task, "shift") == Some(shift))
        })
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    Ok(json!({ "team": team, "scenario": scenario, "tasks": tasks }))
}

/// Deals the team's open tasks out to the present mechanics in turn.
pub async fn generate_assignments(
    ctx: &ApiContext,
    team: &TeamName,
    req: GenerateAssignmentsRequest,
) -> Result<Document, ApiError> {
    if req.present_mechanics.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "at least one mechanic must be present",
        ));
    }
    let tasks = ctx.fixtures.tasks(&req.scenario).await?;
    let assignments: Vec<Value> = tasks
        .iter()
        .filter(|task| task_field(task, "team") == Some(team.as_str()))
        .filter_map(|task| task_field(task, "taskId"))
        .zip(req.present_mechanics.iter().cycle())
        .map(|(task_id, mechanic)| json!({ "taskId": task_id, "mechanicId": mechanic }))
        .collect();
    info!(%team, scenario = %req.scenario, count = assignments.len(), "generated assignments");
    Ok(json!({
        "team": team,
        "scenario": req.scenario,
        "date": req.date,
        "assignments": assignments,
    }))
}

pub async fn assign_task(ctx: &ApiContext, req: AssignTaskRequest) -> Result<Document, ApiError> {
    let known = ctx
        .fixtures
        .tasks(&req.scenario)
        .await?
        .iter()
        .any(|task| task_field(task, "taskId") == Some(req.task_id.as_str()));
    if !known {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("task '{}' not found in {}", req.task_id, req.scenario),
        ));
    }

    ctx.assignments
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(
            (req.scenario.clone(), req.task_id.clone()),
            req.mechanic_id.clone(),
        );
    info!(
        task = %req.task_id,
        mechanic = %req.mechanic_id,
        scenario = %req.scenario,
        "task assigned"
    );
    Ok(json!({
        "status": "assigned",
        "taskId": req.task_id,
        "mechanicId": req.mechanic_id,
        "scenario": req.scenario,
    }))
}

pub async fn late_parts_impact(
    ctx: &ApiContext,
    scenario: &ScenarioId,
) -> Result<Document, ApiError> {
    let late_part = json!(TaskType::LatePart);
    let delayed: Vec<Value> = ctx
        .fixtures
        .tasks(scenario)
        .await?
        .into_iter()
        .filter(|task| task.get("type") == Some(&late_part))
        .collect();
    Ok(json!({
        "scenario": scenario,
        "late_parts": delayed.len(),
        "tasks": delayed,
    }))
}

/// Echoes the what-if request against the scenario; no rescheduling happens here.
pub async fn simulate_priority(
    ctx: &ApiContext,
    req: SimulatePriorityRequest,
) -> Result<Document, ApiError> {
    let tasks = ctx.fixtures.tasks(&req.scenario).await?;
    Ok(json!({
        "scenario": req.scenario,
        "parameters": req.parameters,
        "task_count": tasks.len(),
        "status": "simulated",
    }))
}

const EXPORT_COLUMNS: [&str; 8] = [
    "taskId",
    "type",
    "team",
    "mechanic",
    "shift",
    "product",
    "startTime",
    "endTime",
];

/// CSV rendering of the scenario's tasks.
pub async fn export_csv(ctx: &ApiContext, scenario: &ScenarioId) -> Result<String, ApiError> {
    let tasks = ctx.assigned_tasks(scenario).await?;
    let mut csv = EXPORT_COLUMNS.join(",");
    csv.push('\n');
    for task in &tasks {
        let row: Vec<String> = EXPORT_COLUMNS
            .iter()
            .map(|column| match task.get(*column) {
                Some(Value::String(text)) => csv_field(text),
                Some(Value::Null) | None => String::new(),
                Some(other) => csv_field(&other.to_string()),
            })
            .collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    Ok(csv)
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
