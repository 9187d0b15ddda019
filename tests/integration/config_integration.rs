//! Integration tests for Configuration System

use crate::integration::test_utils::{url, Harness};
use framenav::config::{ConfigLoader, FrameNavConfig};
use framenav::navigation::{DispatchOutcome, ForkReason, LocalNavigationRequest};
use framenav::types::FrameId;
use tempfile::TempDir;

#[test]
fn test_file_config_drives_dispatch_policy() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("framenav.toml");
    std::fs::write(
        &config_file,
        r#"
[policy]
coordinator_side_navigation = false
privileged_schemes = ["chrome", "devtools"]
view_source_scheme = "source"

[history]
max_entries = 5
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert!(config.validate().is_ok());
    let mut h = Harness::build(config, |session| session).with_main_frame();

    let outcome = h
        .session
        .begin_local_navigation(FrameId(1), LocalNavigationRequest::link(url("https://a.test/")))
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::LoadedLocally);

    let outcome = h
        .session
        .begin_local_navigation(
            FrameId(1),
            LocalNavigationRequest::link(url("devtools://inspector/")),
        )
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Forked(ForkReason::PrivilegeBoundary));

    let outcome = h
        .session
        .begin_local_navigation(
            FrameId(1),
            LocalNavigationRequest::link(url("source:https://a.test/")),
        )
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Forked(ForkReason::PrivilegeBoundary));
}

#[test]
fn test_serialized_config_loads_back() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("framenav.toml");
    let mut config = FrameNavConfig::default();
    config.policy.suppress_client_blocked_error_page = true;
    config.history.max_entries = 7;
    config.logging.level = "debug".to_string();
    std::fs::write(&config_file, toml::to_string(&config).unwrap()).unwrap();

    let loaded = ConfigLoader::load_from_file(&config_file).unwrap();

    assert!(loaded.policy.suppress_client_blocked_error_page);
    assert!(loaded.policy.coordinator_side_navigation);
    assert_eq!(loaded.history.max_entries, 7);
    assert_eq!(loaded.logging.level, "debug");
}

#[test]
fn test_invalid_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("framenav.toml");
    std::fs::write(&config_file, "[history]\nmax_entries = 0\n").unwrap();

    assert!(ConfigLoader::load_from_file(&config_file).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml")).is_err());
}
