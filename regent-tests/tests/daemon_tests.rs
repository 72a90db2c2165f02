//! Daemon startup from config files on disk

use regent_daemon::config::RegentConfig;
use regent_daemon::errors::{ConfigError, DaemonError};
use regent_daemon::start_daemon;
use regent_daemon::store::{FileConfigStore, ModeState};
use regent_protocol::{Mode, ServiceId};
use regent_tests::{wait_for_mode, TestServiceBuilder, TestTopologyBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn topology() -> TestTopologyBuilder {
    TestTopologyBuilder::new("production")
        .with_protected_apps(&["regent"])
        .add_service("regent", TestServiceBuilder::role())
        .add_service("web", TestServiceBuilder::role().depends_on("db"))
        .add_service("db", TestServiceBuilder::role())
        .add_mode("production", &["web", "db"])
}

/// Write `regent.yaml` next to the topology, the way an operator lays it out
fn write_config(dir: &Path, topology: TestTopologyBuilder) -> PathBuf {
    topology.write_to_file(dir).unwrap();
    let config_path = dir.join("regent.yaml");
    let contents = format!(
        "node: node1\ntopology: topology.yaml\nstate_dir: {}\nalready_running: [regent]\n",
        dir.join("state").display()
    );
    std::fs::write(&config_path, contents).unwrap();
    config_path
}

#[tokio::test]
async fn test_daemon_unlocks_default_mode() {
    let temp_dir = TempDir::new().unwrap();
    let config = RegentConfig::load(&write_config(temp_dir.path(), topology())).unwrap();

    let handle = start_daemon(&config).await.unwrap();

    wait_for_mode(&handle, "production", Duration::from_secs(1))
        .await
        .unwrap();
    assert!(handle.should_i_run("db".into()).await.unwrap());
    assert!(!handle.should_i_run("unknown".into()).await.unwrap());

    let persisted = std::fs::read_to_string(temp_dir.path().join("state/modes.json")).unwrap();
    let state: ModeState = serde_json::from_str(&persisted).unwrap();
    assert_eq!(state.current_mode, Some(Mode::from("production")));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_daemon_stays_protected_when_stored_default_is_undefined() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), topology());

    // A previous run left a default mode the current topology no longer has
    let store = FileConfigStore::open(
        temp_dir.path().join("state"),
        ModeState::new(Mode::from("retired"), BTreeSet::new()),
    )
    .unwrap();
    drop(store);

    let config = RegentConfig::load(&config_path).unwrap();
    let handle = start_daemon(&config).await.unwrap();

    assert_eq!(handle.current_mode().await.unwrap(), Mode::protected());
    assert_eq!(handle.running_services().await.unwrap().len(), 1);
    // Stored state wins over the topology's protected list
    assert!(handle.allowed_apps().await.unwrap().is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_daemon_reports_invalid_topology() {
    let temp_dir = TempDir::new().unwrap();
    let cyclic = TestTopologyBuilder::new("production")
        .add_service("a", TestServiceBuilder::new().depends_on("b"))
        .add_service("b", TestServiceBuilder::new().depends_on("a"))
        .add_mode("production", &["a", "b"]);
    let config = RegentConfig::load(&write_config(temp_dir.path(), cyclic)).unwrap();

    let err = start_daemon(&config).await.unwrap_err();
    assert!(matches!(err, DaemonError::Config(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn test_daemon_uses_configured_bootstrap_service() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = RegentConfig::load(&write_config(temp_dir.path(), topology())).unwrap();
    config.bootstrap_service = ServiceId::from("db");

    let handle = start_daemon(&config).await.unwrap();

    wait_for_mode(&handle, "production", Duration::from_secs(1))
        .await
        .unwrap();
    // regent from the inventory plus the reported db
    assert_eq!(handle.running_services().await.unwrap().len(), 2);

    handle.shutdown().await;
}
