//! Wire-level dispatch through call_raw / notify_raw

use regent_protocol::protocol::{
    decode_response, encode, Admission, Blocker, Notification, Request, Response, RunningEntry,
};
use regent_protocol::{Mode, ServiceId};
use regent_tests::{TestOrchestrator, TestServiceBuilder, TestTopologyBuilder};

fn orchestrator() -> TestOrchestrator {
    let topology = TestTopologyBuilder::new("live")
        .with_protected_apps(&["web"])
        .add_service("web", TestServiceBuilder::role().depends_on("db"))
        .add_service("db", TestServiceBuilder::role())
        .add_mode("live", &["web", "db"])
        .build();
    TestOrchestrator::start(topology, "node1", &[]).unwrap()
}

async fn call_json(orch: &TestOrchestrator, request: &Request) -> Response {
    let bytes = encode(request).unwrap();
    orch.handle.call_raw(&bytes).await
}

#[tokio::test]
async fn test_admission_over_the_wire() {
    let orch = orchestrator();

    let response = call_json(
        &orch,
        &Request::OkToStart {
            service: "web".into(),
        },
    )
    .await;
    assert_eq!(
        response,
        Response::Admission(Admission::Blocked(vec![Blocker::not_running("db")]))
    );

    // Round trip through bytes the way a remote caller would see it
    let bytes = encode(&response).unwrap();
    assert_eq!(decode_response(&bytes).unwrap(), response);
}

#[tokio::test]
async fn test_notifications_over_the_wire() {
    let orch = orchestrator();

    let running = encode(&Notification::Running {
        service: "db".into(),
        node: "node1".into(),
    })
    .unwrap();
    orch.handle.notify_raw(&running).await;

    assert_eq!(
        call_json(&orch, &Request::RunningServices).await,
        Response::Running(vec![RunningEntry::new("db", "node1")])
    );
    assert_eq!(
        call_json(&orch, &Request::ShouldIRun { service: "db".into() }).await,
        Response::Bool(true)
    );
}

#[tokio::test]
async fn test_newer_peer_messages_are_tolerated() {
    let orch = orchestrator();

    assert_eq!(
        orch.handle
            .call_raw(br#"{"type":"drain_node","node":"node1","grace":30}"#)
            .await,
        Response::UnknownRequest
    );
    orch.handle
        .notify_raw(br#"{"type":"degraded","service":"db","node":"node1"}"#)
        .await;

    // Still fully functional
    assert_eq!(
        call_json(&orch, &Request::CurrentMode).await,
        Response::Mode(Mode::protected())
    );
    assert_eq!(
        call_json(&orch, &Request::RunningServices).await,
        Response::Running(vec![])
    );
}

#[tokio::test]
async fn test_set_mode_over_the_wire() {
    let orch = orchestrator();

    assert_eq!(
        call_json(&orch, &Request::SetMode { mode: "live".into() }).await,
        Response::Ok
    );
    assert_eq!(
        call_json(&orch, &Request::AllowedApps).await,
        Response::Services(vec![ServiceId::from("db"), ServiceId::from("web")])
    );
    assert_eq!(
        call_json(&orch, &Request::SetMode { mode: "dead".into() }).await,
        Response::Error {
            message: "Unknown mode: dead".to_string()
        }
    );
}

#[tokio::test]
async fn test_graph_over_the_wire() {
    let orch = orchestrator();

    let Response::Graph(snapshot) = call_json(&orch, &Request::Graph).await else {
        panic!("expected a graph response");
    };
    assert_eq!(snapshot.services.len(), 2);
    assert_eq!(snapshot.edges.len(), 1);
    assert_eq!(snapshot.edges[0].from, ServiceId::from("web"));
    assert_eq!(snapshot.edges[0].to, ServiceId::from("db"));
}

#[tokio::test]
async fn test_closed_orchestrator_reports_error() {
    let orch = orchestrator();
    orch.handle.shutdown().await;

    assert_eq!(
        call_json(&orch, &Request::CurrentMode).await,
        Response::Error {
            message: "Orchestrator is not running".to_string()
        }
    );
}
