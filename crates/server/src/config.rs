use std::{collections::HashMap, fs, path::Path, path::PathBuf};

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub fixtures_dir: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".into(),
            fixtures_dir: None,
        }
    }
}

pub fn load_settings() -> ServerSettings {
    load_settings_from(Path::new("server.toml"), |key| std::env::var(key).ok())
}

/// Defaults, then the optional toml file, then environment overrides.
pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ServerSettings {
    let mut settings = ServerSettings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("bind_addr") {
                    settings.bind_addr = v.clone();
                }
                if let Some(v) = file_cfg.get("fixtures_dir") {
                    settings.fixtures_dir = Some(PathBuf::from(v));
                }
            }
            Err(error) => {
                warn!(file = %file.display(), %error, "ignoring malformed settings file")
            }
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }
    if let Some(v) = env("APP__FIXTURES_DIR") {
        settings.fixtures_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v));
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
