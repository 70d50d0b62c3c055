use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MechanicId, ScenarioId, TaskId, TeamName};

/// Backend-owned JSON document. The dashboard core never inspects its schema.
pub type Document = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: ScenarioId,
    pub name: String,
    #[serde(default)]
    pub task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioListResponse {
    pub scenarios: Vec<ScenarioSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamTaskFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl TeamTaskFilters {
    pub fn for_scenario(scenario: ScenarioId) -> Self {
        Self {
            scenario: Some(scenario),
            ..Self::default()
        }
    }

    /// Query pairs in a stable order so identical filters produce identical URLs.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(scenario) = &self.scenario {
            pairs.push(("scenario", scenario.to_string()));
        }
        if let Some(shift) = &self.shift {
            pairs.push(("shift", shift.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTaskRequest {
    pub task_id: TaskId,
    pub mechanic_id: MechanicId,
    pub scenario: ScenarioId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAssignmentsRequest {
    pub scenario: ScenarioId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub present_mechanics: Vec<MechanicId>,
}

/// What-if request forwarded to the backend simulator; parameters are backend-defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatePriorityRequest {
    pub scenario: ScenarioId,
    #[serde(flatten)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentGenerated {
    pub team: TeamName,
    pub scenario: ScenarioId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
