//! Startup validation and the initial protected-mode allowed set

use regent_daemon::orchestrator::OrchestratorError;
use regent_daemon::store::{ConfigStore, FileConfigStore, ModeState};
use regent_daemon::OrchestratorConfig;
use regent_protocol::protocol::RunningEntry;
use regent_protocol::{Mode, ServiceId};
use regent_tests::{TestOrchestrator, TestServiceBuilder, TestTopologyBuilder};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

fn names(list: &[&str]) -> BTreeSet<ServiceId> {
    list.iter().map(|s| ServiceId::from(*s)).collect()
}

/// regent <- console; api -> db -> disk; batch; stdlib foundational
fn cluster() -> TestTopologyBuilder {
    TestTopologyBuilder::new("normal")
        .with_protected_apps(&["console"])
        .add_service("regent", TestServiceBuilder::new().depends_on("stdlib"))
        .add_service("stdlib", TestServiceBuilder::new().load_only().foundational())
        .add_service("console", TestServiceBuilder::role().depends_on("db"))
        .add_service("api", TestServiceBuilder::role().depends_on("db"))
        .add_service("db", TestServiceBuilder::role().depends_on("disk"))
        .add_service("disk", TestServiceBuilder::role().load_only())
        .add_service("batch", TestServiceBuilder::role().on_node("node2"))
        .add_service("metrics", TestServiceBuilder::new())
        .add_mode("normal", &["api", "db", "disk", "batch"])
}

#[tokio::test]
async fn test_startup_enters_protected_mode() {
    let orch = TestOrchestrator::start(cluster().build(), "node1", &[]).unwrap();

    assert_eq!(orch.handle.current_mode().await.unwrap(), Mode::protected());
    assert_eq!(orch.store.current_mode().unwrap(), Some(Mode::protected()));
}

#[tokio::test]
async fn test_protected_allowed_set_is_closure_of_protected_apps() {
    let orch = TestOrchestrator::start(cluster().build(), "node1", &[]).unwrap();

    // console pulls in db and disk; regent and metrics are not in the closure
    assert_eq!(
        orch.handle.allowed_apps().await.unwrap(),
        names(&["console", "db", "disk"])
    );
    assert!(orch.handle.should_i_run("db".into()).await.unwrap());
    assert!(!orch.handle.should_i_run("api".into()).await.unwrap());
    assert!(!orch.handle.should_i_run("metrics".into()).await.unwrap());
}

#[tokio::test]
async fn test_protected_allowed_set_excludes_services_without_controller() {
    // batch lives on node2, so node1 has no controller for it
    let topology = cluster().with_protected_apps(&["console", "batch"]).build();
    let orch = TestOrchestrator::start(topology, "node1", &[]).unwrap();

    assert_eq!(
        orch.handle.allowed_apps().await.unwrap(),
        names(&["console", "db", "disk"])
    );
}

#[tokio::test]
async fn test_controllers_only_for_local_non_foundational_services() {
    let orch = TestOrchestrator::start(cluster().build(), "node1", &[]).unwrap();

    assert_eq!(
        orch.controllers.controlled(),
        vec![
            ServiceId::from("api"),
            ServiceId::from("console"),
            ServiceId::from("db"),
            ServiceId::from("disk"),
            ServiceId::from("metrics"),
            ServiceId::from("regent"),
        ]
    );
    assert!(!orch.controllers.has_controller("stdlib"));
    assert!(!orch.controllers.has_controller("batch"));
}

#[tokio::test]
async fn test_startup_does_not_notify_controllers() {
    let orch = TestOrchestrator::start(cluster().build(), "node1", &[]).unwrap();
    orch.handle.current_mode().await.unwrap();

    for (service, events) in orch.controllers.drain_all() {
        assert!(events.is_empty(), "{} got {:?}", service, events);
    }
}

#[tokio::test]
async fn test_registry_seeded_from_local_inventory() {
    let orch = TestOrchestrator::start(cluster().build(), "node1", &["db", "regent"]).unwrap();

    assert_eq!(
        orch.handle.running_services().await.unwrap(),
        vec![
            RunningEntry::new("db", "node1"),
            RunningEntry::new("regent", "node1"),
        ]
    );
    // Already-running bootstrap service does not unlock on its own
    assert!(orch.handle.current_mode().await.unwrap().is_protected());
}

#[tokio::test]
async fn test_orphaned_role_dependencies_fail_startup() {
    // api depends on cache and queue which are not role apps; queue pulls in broker
    let topology = cluster()
        .add_service(
            "api",
            TestServiceBuilder::role().depends_on("db").depends_on("cache").uses("queue"),
        )
        .add_service("cache", TestServiceBuilder::new())
        .add_service("queue", TestServiceBuilder::new().depends_on("broker"))
        .add_service("broker", TestServiceBuilder::new())
        .build();

    for _ in 0..3 {
        let result = TestOrchestrator::start(topology.clone(), "node1", &[]);
        match result {
            Err(OrchestratorError::OrphanedDependencies { orphans }) => {
                assert_eq!(orphans, names(&["broker", "cache", "queue"]));
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("startup should have failed"),
        }
    }
}

#[tokio::test]
async fn test_orphan_failure_starts_no_controllers() {
    let topology = TestTopologyBuilder::new("m")
        .add_service("a", TestServiceBuilder::role().depends_on("b"))
        .add_service("b", TestServiceBuilder::new())
        .add_mode("m", &["a"])
        .build();
    let store = Arc::new(regent_daemon::store::MemoryConfigStore::new(
        Mode::from("m"),
        BTreeSet::new(),
    ));

    let result = TestOrchestrator::start_with_store(
        OrchestratorConfig::new("node1"),
        topology,
        store.clone(),
        &[],
    );
    assert!(matches!(
        result,
        Err(OrchestratorError::OrphanedDependencies { .. })
    ));
    // Nothing was persisted either
    assert_eq!(store.current_mode().unwrap(), None);
}

#[tokio::test]
async fn test_foundational_dependencies_are_not_orphans() {
    let topology = TestTopologyBuilder::new("m")
        .add_service("a", TestServiceBuilder::role().depends_on("kernel"))
        .add_service("kernel", TestServiceBuilder::new())
        .add_mode("m", &["a"])
        .build();

    let mut config = OrchestratorConfig::new("node1");
    config.foundational_services.insert(ServiceId::from("kernel"));
    let orch = TestOrchestrator::start_with_config(config, topology, &[]).unwrap();

    assert!(!orch.controllers.has_controller("kernel"));
    assert!(orch.controllers.has_controller("a"));
}

#[tokio::test]
async fn test_startup_persists_protected_mode_to_file_store() {
    let temp_dir = TempDir::new().unwrap();
    let topology = cluster().build();
    let store = Arc::new(
        FileConfigStore::open(
            temp_dir.path().to_path_buf(),
            ModeState::new(topology.default_mode.clone(), topology.protected_apps.clone()),
        )
        .unwrap(),
    );

    let _orch = TestOrchestrator::start_with_store(
        OrchestratorConfig::new("node1"),
        topology,
        store,
        &[],
    )
    .unwrap();

    let content = std::fs::read_to_string(temp_dir.path().join("modes.json")).unwrap();
    let state: ModeState = serde_json::from_str(&content).unwrap();
    assert_eq!(state.current_mode, Some(Mode::protected()));
    assert_eq!(state.default_mode, Mode::from("normal"));
    assert_eq!(state.protected_apps, names(&["console"]));
}
