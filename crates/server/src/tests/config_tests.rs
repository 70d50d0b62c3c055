use super::{load_settings_from, ServerSettings};

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("scenario_server_{name}_{suffix}.toml"));
    fs::write(&path, contents).expect("write settings");
    path
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(Path::new("/nonexistent/server.toml"), env_of(&[]));
    assert_eq!(settings, ServerSettings::default());
    assert_eq!(settings.bind_addr, "127.0.0.1:5000");
}

#[test]
fn env_overrides_file() {
    let path = temp_file(
        "override",
        "bind_addr = \"0.0.0.0:5000\"\nfixtures_dir = \"./data\"\n",
    );

    let from_file = load_settings_from(&path, env_of(&[]));
    assert_eq!(from_file.bind_addr, "0.0.0.0:5000");
    assert_eq!(from_file.fixtures_dir, Some(PathBuf::from("./data")));

    let overridden = load_settings_from(
        &path,
        env_of(&[("APP__BIND_ADDR", "127.0.0.1:7000"), ("APP__FIXTURES_DIR", "")]),
    );
    assert_eq!(overridden.bind_addr, "127.0.0.1:7000");
    assert_eq!(overridden.fixtures_dir, None);

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn malformed_file_is_ignored() {
    let path = temp_file("malformed", "bind_addr = [");
    let settings = load_settings_from(&path, env_of(&[("SERVER_BIND", "127.0.0.1:9000")]));
    assert_eq!(settings.bind_addr, "127.0.0.1:9000");
    fs::remove_file(path).expect("cleanup");
}
