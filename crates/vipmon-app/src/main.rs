//! # vipmon-app
//!
//! VIPMON 바이너리 진입점.
//! 어댑터 생성(DI), 전역 훅 설치, 파이프라인 초기화/종료, 스토어프론트 데모 실행.

mod lifecycle;
mod storefront;

use anyhow::Result;
use clap::Parser;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use vipmon_core::config::{Environment, MonitoringConfig};
use vipmon_core::config_manager::{ConfigManager, CONFIG_FILE_NAME};
use vipmon_core::models::session::Session;
use vipmon_core::ports::collector::{ErrorCollector, TelemetryCollector};
use vipmon_core::ports::device_info::DeviceInfoProvider;
use vipmon_core::ports::storage::KeyValueStore;
use vipmon_monitor::clock::SystemClock;
use vipmon_monitor::device::SysInfoDeviceProvider;
use vipmon_monitor::error_monitor::ErrorMonitor;
use vipmon_monitor::hooks::{install_panic_hook, ConsoleErrorLayer, GlobalHooks};
use vipmon_monitor::telemetry::AnimationTelemetry;
use vipmon_network::console::ConsoleCollector;
use vipmon_network::http_client::HttpCollectorClient;
use vipmon_storage::sqlite::SqliteKeyValueStore;

use crate::lifecycle::LifecycleManager;

/// DB 파일 이름
const DB_FILE_NAME: &str = "vipmon.db";

/// VIPMON: VIP 스토어프론트 텔레메트리/에러 모니터링 클라이언트
#[derive(Parser, Debug)]
#[command(name = "vipmon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 실행 환경 (production, development). 설정/환경변수보다 우선
    #[arg(long, short = 'e')]
    env: Option<String>,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 데이터 저장 경로
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 인메모리 저장소 사용 (재시작 시 에러 큐 유실)
    #[arg(long)]
    in_memory: bool,

    /// 분석 수집 서버 URL
    #[arg(long)]
    analytics_url: Option<String>,

    /// 에러 수집 서버 URL
    #[arg(long)]
    errors_url: Option<String>,

    /// 데모 라운드 수
    #[arg(long, short = 'r', default_value = "12")]
    rounds: u32,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

/// 설정 파일 경로 결정
///
/// - macOS: `~/Library/Application Support/com.vipmon.client/vipmon.json`
/// - Windows: `%APPDATA%\vipmon\client\config\vipmon.json`
/// - Linux: `~/.config/vipmon/vipmon.json`
fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| {
            ProjectDirs::from("com", "vipmon", "client")
                .map(|p| p.config_dir().join(CONFIG_FILE_NAME))
        })
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// 데이터베이스 경로 결정 (CLI 인자 → 설정 → 플랫폼 기본 경로)
fn resolve_db_path(data_dir: Option<PathBuf>, config: &MonitoringConfig) -> PathBuf {
    data_dir
        .map(|d| d.join(DB_FILE_NAME))
        .or_else(|| config.storage.db_path.clone())
        .or_else(|| {
            ProjectDirs::from("com", "vipmon", "client").map(|p| p.data_dir().join(DB_FILE_NAME))
        })
        .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
}

/// 설정 로드: 파일 → 환경변수 → CLI
fn load_config(args: &Args) -> Result<MonitoringConfig> {
    let mut config = match ConfigManager::with_path(resolve_config_path(args.config.clone())) {
        Ok(manager) => {
            info!("설정 파일: {}", manager.config_path().display());
            manager.get()
        }
        Err(e) => {
            warn!("설정 파일 사용 불가, 기본 설정 사용: {e}");
            MonitoringConfig::default_config()
        }
    };

    config.apply_env_with(|key| std::env::var(key).ok());

    if let Some(ref env) = args.env {
        config.environment = Environment::parse(env);
    }
    if let Some(ref url) = args.analytics_url {
        config.telemetry.endpoint = url.clone();
    }
    if let Some(ref url) = args.errors_url {
        config.errors.endpoint = url.clone();
    }
    Ok(config)
}

/// 수집기 생성. 개발 환경은 네트워크 대신 콘솔
fn build_collectors(
    config: &MonitoringConfig,
) -> Result<(Arc<dyn TelemetryCollector>, Arc<dyn ErrorCollector>)> {
    if !config.is_production() {
        info!("개발 환경: 콘솔 수집기 사용");
        let console = Arc::new(ConsoleCollector::new().verbose(true));
        let telemetry: Arc<dyn TelemetryCollector> = console.clone();
        let errors: Arc<dyn ErrorCollector> = console;
        return Ok((telemetry, errors));
    }

    let telemetry = HttpCollectorClient::new(
        &config.telemetry.endpoint,
        &config.telemetry.api_key,
        config.telemetry.request_timeout(),
    )?
    .with_max_retries(config.telemetry.max_retries);
    let errors = HttpCollectorClient::new(
        &config.errors.endpoint,
        &config.errors.api_key,
        config.errors.request_timeout(),
    )?
    .with_max_retries(config.errors.max_retries);

    info!(
        "수집 서버: analytics={}, errors={}",
        config.telemetry.endpoint, config.errors.endpoint
    );
    let telemetry: Arc<dyn TelemetryCollector> = Arc::new(telemetry);
    let errors: Arc<dyn ErrorCollector> = Arc::new(errors);
    Ok((telemetry, errors))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 전역 훅 (콘솔 에러 레이어가 tracing 초기화 시점에 필요)
    let hooks = Arc::new(GlobalHooks::new());

    let log_filter = format!(
        "vipmon={lvl},vipmon_app={lvl},vipmon_core={lvl},vipmon_monitor={lvl},vipmon_network={lvl},vipmon_storage={lvl},storefront={lvl}",
        lvl = args.log_level
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .with(tracing_subscriber::fmt::layer())
        .with(ConsoleErrorLayer::new(hooks.clone()))
        .init();

    install_panic_hook(&hooks);

    info!("VIPMON 시작");

    let config = load_config(&args)?;
    let session = Session::generate();
    info!(
        "세션 {} (환경: {:?}, 앱 {})",
        session.id, config.environment, config.app_version
    );

    // ── 어댑터 생성 (DI 와이어링) ──

    // 1. 수집기
    let (telemetry_collector, error_collector) = build_collectors(&config)?;

    // 2. 저장소
    let store: Arc<dyn KeyValueStore> = if args.in_memory {
        Arc::new(SqliteKeyValueStore::open_in_memory()?)
    } else {
        let db_path = resolve_db_path(args.data_dir.clone(), &config);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Arc::new(SqliteKeyValueStore::open(&db_path)?)
    };

    // 3. 디바이스 정보 / 시계
    let device: Arc<dyn DeviceInfoProvider> =
        Arc::new(SysInfoDeviceProvider::new(&config.app_version));
    let clock = Arc::new(SystemClock::new());

    // ── 파이프라인 ──

    let telemetry = Arc::new(AnimationTelemetry::new(
        telemetry_collector,
        clock,
        device.clone(),
        &session,
        config.telemetry.clone(),
        config.environment,
    ));

    let errors = Arc::new(ErrorMonitor::new(
        error_collector,
        store,
        device,
        hooks.clone(),
        session.clone(),
        config.errors.clone(),
        &config.app_version,
    ));
    errors.init().await;

    // ── 실행 ──

    let lifecycle = LifecycleManager::new(hooks.clone());
    lifecycle
        .run_until_signal(
            "storefront",
            storefront::run(
                telemetry.clone(),
                errors.clone(),
                args.rounds,
                lifecycle.subscribe(),
            ),
        )
        .await;

    // ── 종료: 타이머 정리 + 마지막 flush ──

    let report = lifecycle.shutdown_pipelines(&telemetry, &errors).await;
    info!(
        "텔레메트리 요약: {}",
        serde_json::to_string_pretty(&report.telemetry)?
    );
    info!(
        "에러 모니터 통계: {}",
        serde_json::to_string_pretty(&report.errors)?
    );
    info!("VIPMON 종료");
    Ok(())
}
