use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use shared::domain::{ScenarioId, ViewName};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub base_url: String,
    pub default_view: String,
    pub default_scenario: String,
    pub request_timeout_secs: u64,
    pub log_filter: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            default_view: "team-lead".into(),
            default_scenario: "baseline".into(),
            request_timeout_secs: 30,
            log_filter: "info".into(),
        }
    }
}

impl DashboardSettings {
    pub fn default_view(&self) -> ViewName {
        ViewName::new(self.default_view.as_str())
    }

    pub fn default_scenario(&self) -> ScenarioId {
        ScenarioId::new(self.default_scenario.as_str())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Settings plus whatever had to be ignored while reading them. Loading happens before logging
/// is set up, so the caller reports `problems` once the subscriber exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSettings {
    pub settings: DashboardSettings,
    pub problems: Vec<String>,
}

pub fn load_settings(file: &Path) -> LoadedSettings {
    load_settings_from(file, |key| std::env::var(key).ok())
}

/// Defaults, then the optional toml file, then environment overrides.
pub fn load_settings_from(file: &Path, env: impl Fn(&str) -> Option<String>) -> LoadedSettings {
    let mut problems = Vec::new();
    let mut settings = match fs::read_to_string(file) {
        Ok(raw) => toml::from_str::<DashboardSettings>(&raw).unwrap_or_else(|error| {
            problems.push(format!(
                "ignoring malformed settings file {}: {error}",
                file.display()
            ));
            DashboardSettings::default()
        }),
        Err(_) => DashboardSettings::default(),
    };

    if let Some(v) = env("DASHBOARD_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__DEFAULT_VIEW") {
        settings.default_view = v;
    }
    if let Some(v) = env("APP__DEFAULT_SCENARIO") {
        settings.default_scenario = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(error) => {
                problems.push(format!("ignoring APP__REQUEST_TIMEOUT_SECS={v:?}: {error}"))
            }
        }
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    LoadedSettings { settings, problems }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
