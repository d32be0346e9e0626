//! ---
//! gw_section: "04-networking"
//! gw_subsection: "tests"
//! gw_type: "source"
//! gw_scope: "test"
//! gw_description: "HTTP client behaviour against a mock endpoint."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use gridwatch_client::{
    ActionVerb, ClientError, DashboardSource, DeviceSource, GridClient, Operator,
};
use gridwatch_common::{EndpointConfig, Mode, WatcherConfig};
use gridwatch_core::{
    FetchError, PowerState, Reconciler, SharedReconciler, SnapshotSource, VerificationError,
    VerificationStatus,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GridClient {
    let config = EndpointConfig {
        base_url: Url::parse(&format!("{}/api/", server.uri())).unwrap(),
        ..EndpointConfig::default()
    };
    GridClient::new(&config).unwrap()
}

fn dashboard_reconciler() -> SharedReconciler {
    Reconciler::new(Mode::Dashboard, &WatcherConfig::default()).into_shared()
}

#[tokio::test]
async fn device_source_reads_status_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connected": true,
            "nodeId": "addis_001",
            "region": "Bole",
            "voltage": 221.5,
            "powerState": "NORMAL",
            "logs": ["[10:00:00] Connected to Central Authority."]
        })))
        .mount(&server)
        .await;

    let set = DeviceSource::new(client_for(&server)).fetch().await.unwrap();
    assert_eq!(set.nodes.len(), 1);
    let node = &set.nodes[0];
    assert_eq!(node.id, "addis_001");
    assert_eq!(node.voltage, 221.5);
    assert_eq!(node.power, PowerState::Normal);
    assert_eq!(node.logs.len(), 1);
}

#[tokio::test]
async fn dashboard_source_merges_stats() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "A", "status": "ONLINE", "power": "NORMAL", "transformer": "230.0V | Bole"},
            {"status": "ONLINE", "power": "NORMAL"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "serverId": 3,
            "isLeader": true
        })))
        .mount(&server)
        .await;

    let set = DashboardSource::new(client_for(&server), true)
        .fetch()
        .await
        .unwrap();
    assert_eq!(set.nodes.len(), 1);
    assert_eq!(set.rejected, 1);
    assert_eq!(set.cluster.unwrap().server_id, "3");
}

#[tokio::test]
async fn stats_failure_does_not_fail_the_poll() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let set = DashboardSource::new(client_for(&server), true)
        .fetch()
        .await
        .unwrap();
    assert!(set.nodes.is_empty());
    assert!(set.cluster.is_none());
}

#[tokio::test]
async fn poll_failures_map_to_fetch_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/nodes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = DashboardSource::new(client.clone(), false)
        .fetch()
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Status(500));

    let err = DeviceSource::new(client).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = EndpointConfig {
        base_url: Url::parse(&format!("http://127.0.0.1:{port}/api/")).unwrap(),
        ..EndpointConfig::default()
    };
    let client = GridClient::new(&config).unwrap();

    let err = DeviceSource::new(client).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn action_posts_the_verb() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/action"))
        .and(query_param("action", "outage_start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/action"))
        .and(query_param("action", "reconnect"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Unknown Action"))
        .mount(&server)
        .await;

    let operator = Operator::new(client_for(&server), dashboard_reconciler());
    let reply = operator.request_action(ActionVerb::OutageStart).await.unwrap();
    assert!(reply.status_is("ok"));

    match operator.request_action(ActionVerb::Reconnect).await {
        Err(ClientError::Rejected { message, .. }) => assert_eq!(message, "Unknown Action"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn configure_connects_after_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/configure"))
        .and(query_param("id", "addis_001"))
        .and(query_param("region", "Addis Ababa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "configured"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/action"))
        .and(query_param("action", "connect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let operator = Operator::new(client_for(&server), dashboard_reconciler());
    let reply = operator.configure("addis_001", "Addis Ababa").await.unwrap();
    assert!(reply.status_is("configured"));
}

#[tokio::test]
async fn set_voltage_validates_and_surfaces_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/set_voltage"))
        .and(query_param("v", "180.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/set_voltage"))
        .and(query_param("v", "-1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid Voltage"})))
        .mount(&server)
        .await;

    let operator = Operator::new(client_for(&server), dashboard_reconciler());
    assert!(matches!(
        operator.set_voltage(f64::NAN).await,
        Err(ClientError::InvalidInput(_))
    ));
    operator.set_voltage(180.5).await.unwrap();
    match operator.set_voltage(-1.0).await {
        Err(ClientError::Rejected { message, .. }) => assert_eq!(message, "Invalid Voltage"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn verification_is_not_sent_twice_while_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/verify"))
        .and(query_param("id", "A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "sent"})))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = dashboard_reconciler();
    let operator = Operator::new(client_for(&server), reconciler.clone());
    let status = operator.request_verification("A").await.unwrap();
    assert_eq!(status, VerificationStatus::Pending);

    match operator.request_verification("A").await {
        Err(ClientError::Verification(VerificationError::AlreadyPending { node_id })) => {
            assert_eq!(node_id, "A")
        }
        other => panic!("expected pending refusal, got {other:?}"),
    }
    assert_eq!(
        reconciler.lock().verification().status("A"),
        VerificationStatus::Pending
    );
}

#[tokio::test]
async fn verification_error_payload_leaves_state_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "Node not connected"})))
        .mount(&server)
        .await;

    let reconciler = dashboard_reconciler();
    let operator = Operator::new(client_for(&server), reconciler.clone());
    match operator.request_verification("B").await {
        Err(ClientError::Verification(VerificationError::Rejected { reason, .. })) => {
            assert_eq!(reason, "Node not connected")
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(
        reconciler.lock().verification().status("B"),
        VerificationStatus::None
    );
}
