#![allow(clippy::unwrap_used)]
// Integration tests for `Poller` against a wiremock device.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use airos_core::{Availability, CoreError, DeviceConfig, MacAddress, Poller, RefreshResult};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Poller) {
    let server = MockServer::start().await;
    let mut config = DeviceConfig::new(
        server.uri(),
        "ubnt",
        SecretString::from("hunter2".to_string()),
    );
    config.poll_interval = Duration::ZERO;
    config.timeout = Duration::from_secs(1);
    let poller = Poller::new(config).unwrap();
    (server, poller)
}

fn login_ok() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("set-cookie", "AIROS_0011223344=f00dcafe; Path=/")
        .insert_header("X-CSRF-ID", "csrf-token-1")
        .set_body_json(json!({}))
}

fn status_payload() -> serde_json::Value {
    json!({
        "host": { "device_id": "X1", "hostname": "bridge1" },
        "wireless": {
            "sta": [
                { "mac": "AA:BB:CC:DD:EE:FF", "remote": { "hostname": "bridge2", "mode": "ap-ptp" } },
                { "mac": "11:22:33:44:55:66", "remote": { "hostname": "cpe" } }
            ]
        }
    })
}

async fn mount_login(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(login_ok())
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_publishes_snapshot() {
    let (server, poller) = setup().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .mount(&server)
        .await;

    assert_eq!(poller.availability(), Availability::NeverConnected);

    let result = poller.refresh().await;
    let snapshot = result.snapshot().unwrap();
    assert_eq!(snapshot.hostname(), "bridge1");
    assert_eq!(snapshot.station_count(), 2);

    assert_eq!(poller.availability(), Availability::Available);
    assert!(poller.last_error().is_none());
    assert!(poller.last_success_at().is_some());
    assert!(poller.subscribe().borrow().as_ref().unwrap().is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_refreshes_share_one_cycle() {
    let (server, poller) = setup().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_payload())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (a, b) = tokio::join!(poller.refresh(), poller.refresh());
    assert!(a.is_success());
    assert!(b.is_success());
    assert!(Arc::ptr_eq(a.snapshot().unwrap(), b.snapshot().unwrap()));
}

#[tokio::test]
async fn test_network_error_keeps_previous_snapshot() {
    let (server, poller) = setup().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    assert!(poller.refresh().await.is_success());

    // Device stops answering in time.
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_payload())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let result = poller.refresh().await;
    assert!(matches!(result, RefreshResult::NetworkError { .. }), "got: {result:?}");
    assert_eq!(poller.current_snapshot().unwrap().hostname(), "bridge1");
    assert_eq!(poller.availability(), Availability::Stale);
    assert!(poller.last_error().is_some());
}

#[tokio::test]
async fn test_protocol_error_keeps_session() {
    let (server, poller) = setup().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(2)
        .mount(&server)
        .await;

    for _ in 0..2 {
        let result = poller.refresh().await;
        assert!(matches!(result, RefreshResult::ProtocolError { .. }), "got: {result:?}");
    }
    assert!(poller.client().is_authenticated());
    assert_eq!(poller.availability(), Availability::NeverConnected);
}

#[tokio::test]
async fn test_expired_session_redirect_recovers_next_cycle() {
    let (server, poller) = setup().await;
    mount_login(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login.cgi"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .mount(&server)
        .await;

    assert!(poller.refresh().await.is_success());

    let result = poller.refresh().await;
    assert!(
        matches!(result, RefreshResult::AuthError { consecutive: 1, .. }),
        "got: {result:?}"
    );
    assert!(!poller.client().is_authenticated());
    assert_eq!(poller.availability(), Availability::Stale);

    assert!(poller.refresh().await.is_success());
    assert!(poller.client().is_authenticated());
    assert_eq!(poller.availability(), Availability::Available);
}

#[tokio::test]
async fn test_repeated_auth_failures_flag_config_problem() {
    let (server, poller) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let first = poller.refresh().await;
    assert!(matches!(first, RefreshResult::AuthError { consecutive: 1, .. }), "got: {first:?}");
    assert!(!first.is_config_problem());

    let second = poller.refresh().await;
    assert!(second.is_config_problem());
}

#[tokio::test]
async fn test_success_resets_auth_failure_count() {
    let (server, poller) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(matches!(poller.refresh().await, RefreshResult::AuthError { consecutive: 1, .. }));
    assert!(poller.refresh().await.is_success());
    // Session rejected on the status call: counted from zero again.
    assert!(matches!(poller.refresh().await, RefreshResult::AuthError { consecutive: 1, .. }));
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test]
async fn test_callbacks_fire_until_unsubscribed() {
    let (server, poller) = setup().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let id = poller.on_refresh(move |result| {
        assert!(result.is_success());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    poller.refresh().await;
    poller.refresh().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(poller.unsubscribe(id));
    assert!(!poller.unsubscribe(id));
    poller.refresh().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_and_shutdown() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .mount(&server)
        .await;

    let mut config = DeviceConfig::new(
        server.uri(),
        "ubnt",
        SecretString::from("hunter2".to_string()),
    );
    config.poll_interval = Duration::from_secs(3600);
    let poller = Poller::new(config).unwrap();

    assert!(poller.start().await.is_success());
    assert!(poller.is_running().await);

    poller.shutdown().await;
    assert!(!poller.is_running().await);
    assert!(!poller.client().is_authenticated());
    // The cache outlives the task.
    assert!(poller.current_snapshot().is_some());
}

#[tokio::test]
async fn test_slow_cycle_does_not_queue_catch_up_refreshes() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    let ok = ResponseTemplate::new(200).set_body_json(status_payload());
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ok.clone())
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ok.clone().set_delay(Duration::from_millis(450)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ok)
        .mount(&server)
        .await;

    let mut config = DeviceConfig::new(
        server.uri(),
        "ubnt",
        SecretString::from("hunter2".to_string()),
    );
    config.poll_interval = Duration::from_millis(100);
    config.timeout = Duration::from_secs(2);
    let poller = Poller::new(config).unwrap();

    assert!(poller.start().await.is_success());
    // Ticks missed during the slow cycle would otherwise fire back to back.
    tokio::time::sleep(Duration::from_millis(600)).await;
    poller.shutdown().await;

    let cycles = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/status.cgi")
        .count();
    assert!(cycles <= 4, "expected no catch-up burst, saw {cycles} cycles");
}

// ── Station disconnect ──────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_station_requires_snapshot() {
    let (_server, poller) = setup().await;
    let err = poller
        .disconnect_station(&MacAddress::new("aa:bb:cc:dd:ee:ff"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotStarted), "got: {err:?}");
}

#[tokio::test]
async fn test_disconnect_station_matches_normalized_mac() {
    let (server, poller) = setup().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/stakick.cgi"))
        .and(body_string_contains("staid=AA%3ABB%3ACC%3ADD%3AEE%3AFF"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    poller.refresh().await;
    poller
        .disconnect_station(&MacAddress::new("aabbccddeeff"))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refresh_and_disconnect_share_one_relogin() {
    let (server, poller) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(login_ok().set_delay(Duration::from_millis(200)))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/stakick.cgi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(poller.refresh().await.is_success());
    poller.client().session().invalidate().await;

    // Whichever call takes the session lock first logs in; the other reuses it.
    let mac = MacAddress::new("aa:bb:cc:dd:ee:ff");
    let (kicked, refreshed) = tokio::join!(poller.disconnect_station(&mac), poller.refresh());
    kicked.unwrap();
    assert!(refreshed.is_success(), "got: {refreshed:?}");
}

#[tokio::test]
async fn test_disconnect_unknown_station() {
    let (server, poller) = setup().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_payload()))
        .mount(&server)
        .await;

    poller.refresh().await;
    let err = poller
        .disconnect_station(&MacAddress::new("de:ad:be:ef:00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::StationNotFound { .. }), "got: {err:?}");
}
