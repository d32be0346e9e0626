//! ---
//! gw_section: "06-testing"
//! gw_subsection: "integration"
//! gw_type: "source"
//! gw_scope: "test"
//! gw_description: "Poll loop against a mock telemetry endpoint."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use std::time::Duration;

use gridwatch_client::{EndpointSource, GridClient};
use gridwatch_common::{AppConfig, Mode};
use gridwatch_core::{Label, PollScheduler, Reconciler, SystemStatus, ViewModel};
use serde_json::json;
use tokio::sync::watch;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POLL: Duration = Duration::from_millis(100);

fn config_for(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.endpoint.base_url = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    config.poll.fetch_stats = false;
    config
}

fn start(config: &AppConfig, mode: Mode) -> gridwatch_core::SchedulerHandle {
    let reconciler = Reconciler::new(mode, &config.watcher).into_shared();
    let client = GridClient::new(&config.endpoint).unwrap();
    let source = EndpointSource::for_mode(mode, client, &config.poll);
    PollScheduler::new(source, reconciler, POLL).spawn()
}

async fn next_view(views: &mut watch::Receiver<ViewModel>) -> ViewModel {
    tokio::time::timeout(Duration::from_secs(5), views.changed())
        .await
        .expect("view within five seconds")
        .expect("scheduler alive");
    views.borrow_and_update().clone()
}

fn node(voltage: f64) -> serde_json::Value {
    json!({
        "id": "A",
        "status": "ONLINE",
        "power": "NORMAL",
        "transformer": format!("{voltage}V | Bole"),
        "lastSeen": "2024-05-01 14:03:22",
        "verificationStatus": "NONE"
    })
}

#[tokio::test]
async fn label_flips_when_server_voltage_drops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([node(230.0)])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([node(150.0)])))
        .mount(&server)
        .await;

    let handle = start(&config_for(&server), Mode::Dashboard);
    let mut views = handle.views();

    let first = next_view(&mut views).await;
    assert_eq!(first.node("A").unwrap().classification.label, Label::Normal);
    assert_eq!(first.node("A").unwrap().region, "Bole");

    let second = next_view(&mut views).await;
    assert_eq!(second.node("A").unwrap().classification.label, Label::VeryLow);
    assert_eq!(second.totals.total, 1);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn outage_then_recovery_keeps_ticking() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/nodes"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([node(230.0)])))
        .mount(&server)
        .await;

    let handle = start(&config_for(&server), Mode::Dashboard);
    let mut views = handle.views();

    let degraded = next_view(&mut views).await;
    assert!(matches!(degraded.system, SystemStatus::Offline { .. }));
    assert!(degraded.nodes.is_empty());

    let recovered = next_view(&mut views).await;
    assert!(recovered.system.is_online());
    assert_eq!(recovered.nodes.len(), 1);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn device_inquiry_raises_one_alert() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connected": true,
            "nodeId": "addis_001",
            "region": "Bole",
            "voltage": 180.0,
            "powerState": "LOW",
            "logs": [
                "[10:00:00] Connected to Central Authority.",
                "[10:00:04] HQ is inquiring if the problem is solved..."
            ]
        })))
        .mount(&server)
        .await;

    let handle = start(&config_for(&server), Mode::Device);
    let mut views = handle.views();
    let mut events = handle.subscribe_events();

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(next_view(&mut views).await);
    }
    handle.stop().await.unwrap();

    let alert = events.try_recv().unwrap();
    assert_eq!(alert.node_id, "addis_001");
    assert_eq!(alert.index, 1);
    assert!(events.try_recv().is_err());

    let last = seen.last().unwrap();
    let header = last.device.as_ref().unwrap();
    assert!(header.connected);
    assert!(!header.connect_enabled);
    assert!(!header.needs_setup);
    assert_eq!(last.node("addis_001").unwrap().classification.label, Label::Low);
}
