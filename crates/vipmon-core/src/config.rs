//! 모니터링 설정 구조체.
//!
//! 수집 서버 URL, API 키, 배치/큐 크기, flush 주기, 저장소 경로 등
//! 런타임 설정을 정의한다. JSON 파일 또는 환경변수에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 분석 API 키 환경변수
pub const ENV_ANALYTICS_API_KEY: &str = "VIPMON_ANALYTICS_API_KEY";
/// 에러 모니터링 API 키 환경변수
pub const ENV_ERROR_API_KEY: &str = "VIPMON_ERROR_API_KEY";
/// 실행 환경 환경변수 ("production" / "development")
pub const ENV_ENVIRONMENT: &str = "VIPMON_ENV";
/// 분석 수집 서버 URL 환경변수
pub const ENV_ANALYTICS_URL: &str = "VIPMON_ANALYTICS_URL";
/// 에러 수집 서버 URL 환경변수
pub const ENV_ERRORS_URL: &str = "VIPMON_ERRORS_URL";

/// 분석 API 키 미설정 시 자리표시자
pub const ANALYTICS_API_KEY_PLACEHOLDER: &str = "your-analytics-api-key";
/// 에러 API 키 미설정 시 자리표시자
pub const ERROR_API_KEY_PLACEHOLDER: &str = "your-error-monitoring-api-key";

/// 실행 환경
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// 개발: 텔레메트리 비활성, 네트워크 대신 콘솔 출력
    #[default]
    Development,
    /// 프로덕션: 전체 파이프라인 활성
    Production,
}

impl Environment {
    /// 문자열 파싱 (알 수 없는 값은 Development)
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "release" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// 최상위 모니터링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// 실행 환경
    #[serde(default)]
    pub environment: Environment,
    /// 앱 버전 (에러 페이로드 app_info)
    #[serde(default = "default_app_version")]
    pub app_version: String,
    /// 텔레메트리 파이프라인 설정
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// 에러 모니터링 파이프라인 설정
    #[serde(default)]
    pub errors: ErrorMonitoringConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
}

// ============================================================
// 텔레메트리 설정
// ============================================================

/// 애니메이션 성능 텔레메트리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// 분석 수집 서버 URL
    #[serde(default = "default_analytics_endpoint")]
    pub endpoint: String,
    /// Bearer API 키
    #[serde(default = "default_analytics_api_key")]
    pub api_key: String,
    /// 이 개수가 쌓이면 자동 flush
    #[serde(default = "default_telemetry_batch_size")]
    pub batch_size: usize,
    /// 큐 최대 크기
    #[serde(default = "default_telemetry_queue_size")]
    pub max_queue_size: usize,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 전송 재시도 횟수 (재시도 가능한 에러만)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 자동 종료 타임아웃
    #[serde(default)]
    pub auto_finalize: AutoFinalizeConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analytics_endpoint(),
            api_key: default_analytics_api_key(),
            batch_size: default_telemetry_batch_size(),
            max_queue_size: default_telemetry_queue_size(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            auto_finalize: AutoFinalizeConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// 분석 전송 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// 편의 래퍼의 자동 종료 타임아웃 (밀리초)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoFinalizeConfig {
    /// 탭 전환
    #[serde(default = "default_tab_switch_ms")]
    pub tab_switch_ms: u64,
    /// 요금제 선택
    #[serde(default = "default_plan_selection_ms")]
    pub plan_selection_ms: u64,
    /// 구매 버튼
    #[serde(default = "default_purchase_button_ms")]
    pub purchase_button_ms: u64,
}

impl Default for AutoFinalizeConfig {
    fn default() -> Self {
        Self {
            tab_switch_ms: default_tab_switch_ms(),
            plan_selection_ms: default_plan_selection_ms(),
            purchase_button_ms: default_purchase_button_ms(),
        }
    }
}

// ============================================================
// 에러 모니터링 설정
// ============================================================

/// 에러 모니터링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMonitoringConfig {
    /// 에러 수집 서버 URL
    #[serde(default = "default_errors_endpoint")]
    pub endpoint: String,
    /// Bearer API 키
    #[serde(default = "default_error_api_key")]
    pub api_key: String,
    /// 큐 최대 크기
    #[serde(default = "default_error_queue_size")]
    pub max_queue_size: usize,
    /// 실패 배치 재삽입 상한
    #[serde(default = "default_retry_cap")]
    pub retry_cap: usize,
    /// 주기적 flush 간격 (초)
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// 내구성 미러 저장 키
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 전송 재시도 횟수 (재시도 가능한 에러만)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ErrorMonitoringConfig {
    fn default() -> Self {
        Self {
            endpoint: default_errors_endpoint(),
            api_key: default_error_api_key(),
            max_queue_size: default_error_queue_size(),
            retry_cap: default_retry_cap(),
            flush_interval_secs: default_flush_interval_secs(),
            storage_key: default_storage_key(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl ErrorMonitoringConfig {
    /// flush 주기를 Duration으로 반환
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }

    /// 에러 전송 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ============================================================
// 저장소 설정
// ============================================================

/// 로컬 저장소 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite DB 파일 경로 (None이면 플랫폼 기본 경로)
    pub db_path: Option<PathBuf>,
}

// ============================================================
// MonitoringConfig impl
// ============================================================

impl MonitoringConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            environment: Environment::default(),
            app_version: default_app_version(),
            telemetry: TelemetryConfig::default(),
            errors: ErrorMonitoringConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    /// 기본 설정에 환경변수 오버라이드 적용
    ///
    /// API 키가 없으면 자리표시자를 사용하며 절대 실패하지 않는다.
    pub fn from_env() -> Self {
        let mut config = Self::default_config();
        config.apply_env_with(|key| std::env::var(key).ok());
        config
    }

    /// 주어진 조회 함수로 환경 오버라이드 적용 (테스트 주입용)
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(env) = non_empty(ENV_ENVIRONMENT) {
            self.environment = Environment::parse(&env);
        }
        if let Some(key) = non_empty(ENV_ANALYTICS_API_KEY) {
            self.telemetry.api_key = key;
        }
        if let Some(key) = non_empty(ENV_ERROR_API_KEY) {
            self.errors.api_key = key;
        }
        if let Some(url) = non_empty(ENV_ANALYTICS_URL) {
            self.telemetry.endpoint = url;
        }
        if let Some(url) = non_empty(ENV_ERRORS_URL) {
            self.errors.endpoint = url;
        }
    }

    /// 프로덕션 빌드 여부
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
fn default_analytics_endpoint() -> String {
    "https://analytics.example.com/v1/events".to_string()
}
fn default_errors_endpoint() -> String {
    "https://errors.example.com/v1/errors".to_string()
}
fn default_analytics_api_key() -> String {
    ANALYTICS_API_KEY_PLACEHOLDER.to_string()
}
fn default_error_api_key() -> String {
    ERROR_API_KEY_PLACEHOLDER.to_string()
}
fn default_telemetry_batch_size() -> usize {
    10
}
fn default_telemetry_queue_size() -> usize {
    100
}
fn default_tab_switch_ms() -> u64 {
    1_000
}
fn default_plan_selection_ms() -> u64 {
    500
}
fn default_purchase_button_ms() -> u64 {
    300
}
fn default_error_queue_size() -> usize {
    50
}
fn default_retry_cap() -> usize {
    50
}
fn default_flush_interval_secs() -> u64 {
    300 // 5분
}
fn default_storage_key() -> String {
    "vipmon.error_queue".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_env_uses_placeholders() {
        let mut config = MonitoringConfig::default_config();
        config.apply_env_with(|_| None);
        assert_eq!(config.telemetry.api_key, ANALYTICS_API_KEY_PLACEHOLDER);
        assert_eq!(config.errors.api_key, ERROR_API_KEY_PLACEHOLDER);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            (ENV_ENVIRONMENT, "production"),
            (ENV_ANALYTICS_API_KEY, "ak_live"),
            (ENV_ERROR_API_KEY, "ek_live"),
            (ENV_ERRORS_URL, "http://localhost:9000/errors"),
            (ENV_ANALYTICS_URL, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = MonitoringConfig::default_config();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert!(config.is_production());
        assert_eq!(config.telemetry.api_key, "ak_live");
        assert_eq!(config.errors.api_key, "ek_live");
        assert_eq!(config.errors.endpoint, "http://localhost:9000/errors");
        // 공백 값은 무시
        assert_eq!(config.telemetry.endpoint, default_analytics_endpoint());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: MonitoringConfig =
            serde_json::from_str(r#"{"environment":"production","errors":{"max_queue_size":5}}"#)
                .unwrap();
        assert!(config.is_production());
        assert_eq!(config.errors.max_queue_size, 5);
        assert_eq!(config.errors.flush_interval_secs, 300);
        assert_eq!(config.telemetry.auto_finalize.tab_switch_ms, 1_000);
        assert_eq!(config.telemetry.auto_finalize.plan_selection_ms, 500);
        assert_eq!(config.telemetry.auto_finalize.purchase_button_ms, 300);
    }

    #[test]
    fn pipelines_have_separate_transport_settings() {
        let config: MonitoringConfig = serde_json::from_str(
            r#"{"telemetry":{"max_retries":0,"request_timeout_ms":2000},"errors":{"max_retries":5}}"#,
        )
        .unwrap();
        assert_eq!(config.telemetry.max_retries, 0);
        assert_eq!(config.telemetry.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.errors.max_retries, 5);
        assert_eq!(config.errors.request_timeout(), Duration::from_secs(10));

        let defaults = TelemetryConfig::default();
        assert_eq!(defaults.max_retries, 3);
        assert_eq!(defaults.request_timeout_ms, 10_000);
    }

    #[test]
    fn environment_parse() {
        assert_eq!(Environment::parse("PRODUCTION"), Environment::Production);
        assert_eq!(Environment::parse("dev"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }
}
