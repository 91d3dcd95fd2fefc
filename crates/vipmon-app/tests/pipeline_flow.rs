//! 파이프라인 통합 테스트.
//!
//! mockito 수집 서버 ↔ HTTP 수집기 ↔ 텔레메트리/에러 모니터 전체 흐름.

use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;
use vipmon_core::config::{Environment, ErrorMonitoringConfig, TelemetryConfig};
use vipmon_core::models::context::{context_from, ContextMap, ContextValue};
use vipmon_core::models::device::DeviceSnapshot;
use vipmon_core::models::error_report::{ErrorInput, Severity};
use vipmon_core::models::session::Session;
use vipmon_core::ports::storage::KeyValueStore;
use vipmon_monitor::clock::ManualClock;
use vipmon_monitor::device::StaticDeviceInfo;
use vipmon_monitor::error_monitor::{ErrorMonitor, MonitorState};
use vipmon_monitor::hooks::GlobalHooks;
use vipmon_monitor::telemetry::AnimationTelemetry;
use vipmon_network::http_client::HttpCollectorClient;
use vipmon_storage::sqlite::SqliteKeyValueStore;

fn device() -> Arc<StaticDeviceInfo> {
    Arc::new(StaticDeviceInfo(DeviceSnapshot {
        platform: "linux".to_string(),
        os_version: "6.8".to_string(),
        app_version: "1.4.0".to_string(),
        build: "1.4.0+it".to_string(),
    }))
}

fn client(server: &mockito::ServerGuard, path: &str) -> Arc<HttpCollectorClient> {
    Arc::new(
        HttpCollectorClient::new(
            &format!("{}{}", server.url(), path),
            "it_key",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_max_retries(0),
    )
}

fn error_config() -> ErrorMonitoringConfig {
    ErrorMonitoringConfig {
        // 테스트 중 주기 flush가 끼어들지 않도록
        flush_interval_secs: 3600,
        ..ErrorMonitoringConfig::default()
    }
}

async fn error_monitor(
    server: &mockito::ServerGuard,
    store: Arc<SqliteKeyValueStore>,
) -> Arc<ErrorMonitor> {
    let monitor = Arc::new(ErrorMonitor::new(
        client(server, "/v1/errors"),
        store,
        device(),
        Arc::new(GlobalHooks::new()),
        Session::with_id("sess_it"),
        error_config(),
        "1.4.0",
    ));
    monitor.init().await;
    monitor
}

#[tokio::test]
async fn telemetry_batch_of_ten_is_posted_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/events")
        .match_header("authorization", "Bearer it_key")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "type": "animation_performance",
            "sessionId": "sess_it"
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let clock = Arc::new(ManualClock::new(0.0));
    let config = TelemetryConfig {
        batch_size: 10,
        ..TelemetryConfig::default()
    };
    let telemetry = AnimationTelemetry::new(
        client(&server, "/v1/events"),
        clock.clone(),
        device(),
        &Session::with_id("sess_it"),
        config,
        Environment::Production,
    );

    for i in 0..10 {
        let id = format!("op{i}");
        telemetry.start_tracking(&id, "tab_switch", ContextMap::new());
        clock.advance(25.0);
        assert!(telemetry.end_tracking(&id, true, 0));
    }

    // 배치 크기 도달 flush 완료 대기
    telemetry.dispose().await;
    mock.assert_async().await;

    let summary = telemetry.performance_summary();
    assert_eq!(summary.batches_sent, 1);
    assert_eq!(summary.records_sent, 10);
    assert_eq!(summary.queue_size, 0);
    assert_eq!(summary.records_by_tier.good, 10);
    assert!((summary.average_duration_ms - 25.0).abs() < f64::EPSILON);
    assert!(telemetry.pending_records().is_empty());
}

#[tokio::test]
async fn telemetry_failure_keeps_records_for_next_flush() {
    let mut server = mockito::Server::new_async().await;
    let fail = server
        .mock("POST", "/v1/events")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let clock = Arc::new(ManualClock::new(0.0));
    let telemetry = AnimationTelemetry::new(
        client(&server, "/v1/events"),
        clock.clone(),
        device(),
        &Session::with_id("sess_it"),
        TelemetryConfig::default(),
        Environment::Production,
    );

    telemetry.start_tracking("modal", "modal_animation", ContextMap::new());
    clock.advance(60.0);
    telemetry.end_tracking("modal", false, 2);

    assert!(telemetry.flush().await.is_err());
    assert_eq!(telemetry.pending_records().len(), 1);
    fail.assert_async().await;

    fail.remove_async().await;
    let ok = server
        .mock("POST", "/v1/events")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "batch": [{ "operationId": "modal", "performanceTier": "poor", "frameDrops": 2 }]
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    assert_eq!(telemetry.flush().await.unwrap(), 1);
    ok.assert_async().await;
    assert!(telemetry.pending_records().is_empty());

    let summary = telemetry.performance_summary();
    assert_eq!(summary.batches_failed, 1);
    assert_eq!(summary.batches_sent, 1);
}

#[tokio::test]
async fn error_flush_failure_then_success_clears_mirror() {
    let mut server = mockito::Server::new_async().await;
    let unavailable = server
        .mock("POST", "/v1/errors")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(SqliteKeyValueStore::open_in_memory().unwrap());
    let monitor = error_monitor(&server, store.clone()).await;
    assert_eq!(monitor.state(), MonitorState::Ready);

    monitor
        .log_error(ErrorInput::new("FetchError", "timeout"), ContextMap::new())
        .await
        .unwrap();
    monitor
        .log_network_error(ErrorInput::new("FetchError", "bad gateway"), "/v1/plans", Some(502))
        .await
        .unwrap();

    // 503 → 큐/미러 유지
    assert!(monitor.flush().await.is_err());
    unavailable.assert_async().await;
    assert_eq!(monitor.queued_records().len(), 2);
    let key = error_config().storage_key;
    assert!(store.get(&key).await.unwrap().is_some());

    unavailable.remove_async().await;
    let ok = server
        .mock("POST", "/v1/errors")
        .match_header("authorization", "Bearer it_key")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "session_id": "sess_it",
            "app_info": { "version": "1.4.0", "platform": "linux" }
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    assert_eq!(monitor.flush().await.unwrap(), 2);
    ok.assert_async().await;
    assert!(monitor.queued_records().is_empty());
    assert!(store.get(&key).await.unwrap().is_none());

    let stats = monitor.stats();
    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.batches_sent, 1);
    assert_eq!(stats.total_logged, 2);

    monitor.dispose().await;
}

#[tokio::test]
async fn critical_error_is_sent_immediately_and_in_batch() {
    let mut server = mockito::Server::new_async().await;
    // 즉시 전송 1회 + 종료 flush 1회
    let mock = server
        .mock("POST", "/v1/errors")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let store = Arc::new(SqliteKeyValueStore::open_in_memory().unwrap());
    let monitor = error_monitor(&server, store).await;

    let context = context_from([("critical", ContextValue::from(true))]);
    monitor
        .log_error(ErrorInput::new("StateError", "ledger corrupted"), context)
        .await
        .unwrap();

    let queued = monitor.queued_records();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].severity, Severity::Critical);

    monitor.dispose().await;
    mock.assert_async().await;

    let stats = monitor.stats();
    assert_eq!(stats.immediate_sends, 1);
    assert_eq!(stats.batches_sent, 1);
    assert_eq!(stats.by_severity.critical, 1);
}
