//! Mode transitions: bootstrap unlock, set_mode and persistence

use regent_daemon::controller::ControllerEvent;
use regent_daemon::orchestrator::{ModeError, OrchestratorError};
use regent_daemon::store::{ConfigStore, FileConfigStore, ModeState};
use regent_daemon::OrchestratorConfig;
use regent_protocol::protocol::RunningEntry;
use regent_protocol::{Mode, ServiceId};
use regent_tests::{wait_for_mode, TestOrchestrator, TestServiceBuilder, TestTopologyBuilder};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn names(list: &[&str]) -> BTreeSet<ServiceId> {
    list.iter().map(|s| ServiceId::from(*s)).collect()
}

fn new_mode(mode: &str) -> ControllerEvent {
    ControllerEvent::NewMode {
        mode: Mode::from(mode),
        node: "node1".into(),
    }
}

fn topology() -> TestTopologyBuilder {
    TestTopologyBuilder::new("day")
        .with_protected_apps(&["shell"])
        .add_service("regent", TestServiceBuilder::new())
        .add_service("shell", TestServiceBuilder::role())
        .add_service("web", TestServiceBuilder::role().depends_on("db"))
        .add_service("db", TestServiceBuilder::role())
        .add_service("reports", TestServiceBuilder::role())
        .add_service("logger", TestServiceBuilder::new())
        .add_mode("day", &["web", "db"])
        .add_mode("night", &["db", "reports"])
}

#[tokio::test]
async fn test_bootstrap_running_unlocks_default_mode() {
    let orch = TestOrchestrator::start(topology().build(), "node1", &[]).unwrap();
    let h = &orch.handle;
    assert_eq!(h.allowed_apps().await.unwrap(), names(&["shell"]));

    h.running("regent".into(), "node1".into()).await;
    wait_for_mode(h, "day", Duration::from_secs(1)).await.unwrap();

    assert_eq!(
        h.allowed_apps().await.unwrap(),
        names(&["db", "logger", "regent", "web"])
    );
    assert_eq!(orch.store.current_mode().unwrap(), Some(Mode::from("day")));

    // Every controller but the bootstrap one hears about the new mode
    let events = orch.controllers.drain_all();
    assert!(events[&ServiceId::from("regent")].is_empty());
    for service in ["db", "logger", "reports", "shell", "web"] {
        let got = &events[&ServiceId::from(service)];
        assert_eq!(got.last(), Some(&new_mode("day")), "{}", service);
        assert_eq!(
            got.iter().filter(|e| matches!(e, ControllerEvent::NewMode { .. })).count(),
            1
        );
    }
}

#[tokio::test]
async fn test_custom_bootstrap_service() {
    let config = OrchestratorConfig::new("node1").with_bootstrap_service("shell");
    let orch = TestOrchestrator::start_with_config(config, topology().build(), &[]).unwrap();

    orch.handle.running("regent".into(), "node1".into()).await;
    assert!(orch.handle.current_mode().await.unwrap().is_protected());

    orch.handle.running("shell".into(), "node1".into()).await;
    assert_eq!(orch.handle.current_mode().await.unwrap(), Mode::from("day"));
    assert!(!orch
        .events("shell")
        .iter()
        .any(|e| matches!(e, ControllerEvent::NewMode { .. })));
}

#[tokio::test]
async fn test_unlock_into_invalid_default_stays_protected() {
    let orch = TestOrchestrator::start(
        TestTopologyBuilder::new("missing")
            .add_service("regent", TestServiceBuilder::new())
            .build(),
        "node1",
        &[],
    )
    .unwrap();

    orch.handle.running("regent".into(), "node1".into()).await;
    assert!(orch.handle.current_mode().await.unwrap().is_protected());
    assert_eq!(
        orch.handle.running_services().await.unwrap(),
        vec![RunningEntry::new("regent", "node1")]
    );
}

#[tokio::test]
async fn test_set_mode_notifies_every_controller() {
    let orch = TestOrchestrator::start(topology().build(), "node1", &[]).unwrap();

    orch.handle.set_mode(Mode::from("night")).await.unwrap();
    assert_eq!(
        orch.handle.allowed_apps().await.unwrap(),
        names(&["db", "logger", "regent", "reports"])
    );

    for (service, events) in orch.controllers.drain_all() {
        assert_eq!(events, vec![new_mode("night")], "{}", service);
    }
}

#[tokio::test]
async fn test_set_same_mode_is_a_no_op() {
    let orch = TestOrchestrator::start(topology().build(), "node1", &[]).unwrap();
    orch.handle.set_mode(Mode::from("night")).await.unwrap();
    orch.controllers.drain_all();

    orch.handle.set_mode(Mode::from("night")).await.unwrap();
    for (_, events) in orch.controllers.drain_all() {
        assert!(events.is_empty());
    }
}

#[tokio::test]
async fn test_set_unknown_mode_changes_nothing() {
    let orch = TestOrchestrator::start(topology().build(), "node1", &["db"]).unwrap();
    let h = &orch.handle;
    h.set_mode(Mode::from("day")).await.unwrap();
    orch.controllers.drain_all();

    let allowed = h.allowed_apps().await.unwrap();
    let running = h.running_services().await.unwrap();

    let err = h.set_mode(Mode::from("weekend")).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Mode(ModeError::UnknownMode(ref m)) if m.as_str() == "weekend"
    ));
    assert_eq!(err.to_string(), "Unknown mode: weekend");

    assert_eq!(h.current_mode().await.unwrap(), Mode::from("day"));
    assert_eq!(h.allowed_apps().await.unwrap(), allowed);
    assert_eq!(h.running_services().await.unwrap(), running);
    assert_eq!(orch.store.current_mode().unwrap(), Some(Mode::from("day")));
    for (_, events) in orch.controllers.drain_all() {
        assert!(events.is_empty());
    }
}

#[tokio::test]
async fn test_return_to_protected_mode() {
    let orch = TestOrchestrator::start(topology().build(), "node1", &[]).unwrap();
    orch.handle.set_mode(Mode::from("day")).await.unwrap();
    orch.handle.set_mode(Mode::protected()).await.unwrap();

    assert_eq!(orch.handle.allowed_apps().await.unwrap(), names(&["shell"]));
    assert_eq!(
        orch.events("regent"),
        vec![new_mode("day"), new_mode("protected")]
    );
}

#[tokio::test]
async fn test_mode_changes_persist_across_restart() {
    let temp_dir = TempDir::new().unwrap();
    let seed = ModeState::new(Mode::from("day"), names(&["shell"]));

    {
        let store = Arc::new(FileConfigStore::open(temp_dir.path().to_path_buf(), seed.clone()).unwrap());
        let orch = TestOrchestrator::start_with_store(
            OrchestratorConfig::new("node1"),
            topology().build(),
            store.clone(),
            &[],
        )
        .unwrap();
        orch.handle.set_mode(Mode::from("night")).await.unwrap();
        store.set_default_mode(Mode::from("night")).unwrap();
        orch.handle.shutdown().await;
    }

    let store = Arc::new(FileConfigStore::open(temp_dir.path().to_path_buf(), seed).unwrap());
    assert_eq!(store.current_mode().unwrap(), Some(Mode::from("night")));

    // A restarted orchestrator comes up protected and unlocks into the stored default
    let orch = TestOrchestrator::start_with_store(
        OrchestratorConfig::new("node1"),
        topology().build(),
        store.clone(),
        &[],
    )
    .unwrap();
    assert!(orch.handle.current_mode().await.unwrap().is_protected());
    orch.handle.running("regent".into(), "node1".into()).await;
    assert_eq!(orch.handle.current_mode().await.unwrap(), Mode::from("night"));
    assert_eq!(store.snapshot().current_mode, Some(Mode::from("night")));
}
