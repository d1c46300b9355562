#![allow(clippy::unwrap_used)]
// Loading and saving config files on disk.

use std::time::Duration;

use pretty_assertions::assert_eq;

use praxis_config::{
    Config, Profile, load_config_from, profile_to_engine_config, save_config_to,
};

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.default_profile.as_deref(), Some("default"));
    assert_eq!(cfg.defaults.output, "table");
    assert_eq!(cfg.defaults.timeout, 30);
    assert!(cfg.profiles.is_empty());
}

#[test]
fn partial_file_keeps_defaults_for_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
default_profile = "stage"

[defaults]
output = "json"

[profiles.stage]
url = "ws://stage.local:9000/ws"
request_timeout_secs = 5
"#,
    )
    .unwrap();

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(cfg.active_profile_name(None), "stage");
    assert_eq!(cfg.defaults.output, "json");
    assert_eq!(cfg.defaults.color, "auto");

    let engine = profile_to_engine_config(cfg.profile("stage").unwrap()).unwrap();
    assert_eq!(engine.url.as_str(), "ws://stage.local:9000/ws");
    assert_eq!(engine.request_timeout, Duration::from_secs(5));
    assert_eq!(engine.max_reconnect_attempts, 3);
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::with_default_profile("ws://localhost:8080/ws");
    cfg.profiles.insert(
        "studio".into(),
        Profile {
            max_reconnect_attempts: Some(10),
            ..Profile::new("wss://studio.local/ws")
        },
    );
    save_config_to(&cfg, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[profiles.studio]"));
    assert!(!text.contains("connect_timeout_secs"));

    assert_eq!(load_config_from(&path).unwrap(), cfg);
}

#[test]
fn malformed_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "profiles = 3").unwrap();
    assert!(load_config_from(&path).is_err());
}
