//! Scenario task lists served by the development backend.
//!
//! A scenario is read from `<fixtures_dir>/<scenario>.json` when that file exists; the four
//! well-known scenarios fall back to a generated sample so the backend works out of the box.

use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use shared::{
    domain::{ScenarioId, TaskType},
    error::{ApiError, ErrorCode},
    protocol::ScenarioSummary,
};
use tracing::{debug, warn};

pub const BUILTIN_SCENARIOS: [(&str, &str); 4] = [
    ("baseline", "Baseline"),
    ("scenario1", "Scenario 1"),
    ("scenario2", "Scenario 2"),
    ("scenario3", "Scenario 3"),
];

pub const SAMPLE_TEAMS: [&str; 2] = ["Mechanic Team 1", "Quality Team 1"];

const SAMPLE_TASKS: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    dir: Option<PathBuf>,
}

impl FixtureStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Built-in scenarios first, then any extra fixture files in name order.
    pub async fn scenarios(&self) -> Result<Vec<ScenarioSummary>, ApiError> {
        let mut ids: Vec<String> = BUILTIN_SCENARIOS
            .iter()
            .map(|(id, _)| id.to_string())
            .collect();
        let mut extra = BTreeSet::new();
        if let Some(dir) = &self.dir {
            match tokio::fs::read_dir(dir).await {
                Ok(mut entries) => {
                    while let Ok(Some(entry)) = entries.next_entry().await {
                        let path = entry.path();
                        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                            continue;
                        }
                        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                            if is_valid_id(stem) && !ids.iter().any(|id| id == stem) {
                                extra.insert(stem.to_string());
                            }
                        }
                    }
                }
                Err(error) => warn!(dir = %dir.display(), %error, "cannot list fixtures"),
            }
        }
        ids.extend(extra);

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            let scenario = ScenarioId::new(id);
            let task_count = self.tasks(&scenario).await?.len();
            summaries.push(ScenarioSummary {
                name: display_name(&scenario),
                id: scenario,
                task_count,
            });
        }
        Ok(summaries)
    }

    pub async fn tasks(&self, scenario: &ScenarioId) -> Result<Vec<Value>, ApiError> {
        if !is_valid_id(scenario.as_str()) {
            return Err(ApiError::new(
                ErrorCode::Validation,
                format!("invalid scenario id '{scenario}'"),
            ));
        }

        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{scenario}.json"));
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => {
                    debug!(path = %path.display(), "serving scenario fixture");
                    return parse_task_list(&raw).map_err(|message| {
                        ApiError::new(
                            ErrorCode::Internal,
                            format!("fixture {}: {message}", path.display()),
                        )
                    });
                }
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => {
                    return Err(ApiError::new(
                        ErrorCode::Internal,
                        format!("cannot read fixture {}: {error}", path.display()),
                    ))
                }
            }
        }

        let offset = BUILTIN_SCENARIOS
            .iter()
            .position(|(id, _)| *id == scenario.as_str())
            .ok_or_else(|| {
                ApiError::new(
                    ErrorCode::NotFound,
                    format!("unknown scenario '{scenario}'"),
                )
            })?;
        Ok(sample_tasks(offset))
    }
}

/// Fixture files hold either a bare task array or an object with a `tasks` array.
fn parse_task_list(raw: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(raw).map_err(|error| error.to_string())? {
        Value::Array(tasks) => Ok(tasks),
        Value::Object(mut document) => match document.remove("tasks") {
            Some(Value::Array(tasks)) => Ok(tasks),
            _ => Err("expected a `tasks` array".into()),
        },
        _ => Err("expected a task array".into()),
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn display_name(scenario: &ScenarioId) -> String {
    BUILTIN_SCENARIOS
        .iter()
        .find(|(id, _)| *id == scenario.as_str())
        .map_or_else(|| scenario.to_string(), |(_, name)| name.to_string())
}

fn sample_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 25, 6, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Deterministic task list; each scenario shifts the same work by two hours.
fn sample_tasks(scenario_offset: usize) -> Vec<Value> {
    const TYPES: [TaskType; SAMPLE_TASKS] = [
        TaskType::Production,
        TaskType::Production,
        TaskType::QualityInspection,
        TaskType::LatePart,
        TaskType::Production,
        TaskType::Rework,
        TaskType::QualityInspection,
        TaskType::Production,
    ];
    let epoch = sample_epoch() + Duration::hours(2 * scenario_offset as i64);

    TYPES
        .iter()
        .enumerate()
        .map(|(index, task_type)| {
            let start = epoch + Duration::minutes(90 * index as i64);
            let minutes = 60 + (index as i64 * 15) % 90;
            let team = match task_type {
                TaskType::QualityInspection => SAMPLE_TEAMS[1],
                _ => SAMPLE_TEAMS[0],
            };
            json!({
                "taskId": format!("E_{}", 11 + index * 4),
                "type": task_type,
                "cssClass": task_type.css_class(),
                "team": team,
                "shift": if index < SAMPLE_TASKS / 2 { "1st" } else { "2nd" },
                "product": format!("Product {}", char::from(b'A' + (index % 3) as u8)),
                "startTime": start.to_rfc3339(),
                "endTime": (start + Duration::minutes(minutes)).to_rfc3339(),
                "duration": minutes,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/fixtures_tests.rs"]
mod tests;
