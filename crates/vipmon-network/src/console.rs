//! 개발 환경용 콘솔 수집기.
//!
//! 네트워크 전송 대신 페이로드 요약을 진단 채널로 출력한다. 항상 성공.

use async_trait::async_trait;
use tracing::info;
use vipmon_core::error::CoreError;
use vipmon_core::models::error_report::ErrorPayload;
use vipmon_core::models::telemetry::TelemetryPayload;
use vipmon_core::ports::collector::{ErrorCollector, TelemetryCollector};
use vipmon_core::DIAGNOSTICS_TARGET;

/// 콘솔 수집기
#[derive(Debug, Clone, Default)]
pub struct ConsoleCollector {
    /// 레코드 단위 상세 출력 여부
    verbose: bool,
}

impl ConsoleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드 단위 상세 출력
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl TelemetryCollector for ConsoleCollector {
    async fn send_telemetry(&self, payload: &TelemetryPayload) -> Result<(), CoreError> {
        info!(
            target: DIAGNOSTICS_TARGET,
            session = %payload.session_id,
            "[dev] 텔레메트리 배치 {}개 ({})",
            payload.batch.len(),
            payload.payload_type
        );
        if self.verbose {
            for record in &payload.batch {
                info!(
                    target: DIAGNOSTICS_TARGET,
                    "[dev]   {} {} {:.2}ms {} drops={}",
                    record.category,
                    record.operation_id,
                    record.duration_ms,
                    record.performance_tier.as_str(),
                    record.frame_drops
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ErrorCollector for ConsoleCollector {
    async fn send_errors(&self, payload: &ErrorPayload) -> Result<(), CoreError> {
        info!(
            target: DIAGNOSTICS_TARGET,
            session = %payload.session_id,
            "[dev] 에러 배치 {}개 (앱 {} / {})",
            payload.errors.len(),
            payload.app_info.version,
            payload.app_info.platform
        );
        if self.verbose {
            for record in &payload.errors {
                info!(
                    target: DIAGNOSTICS_TARGET,
                    "[dev]   [{}] {}: {} ({})",
                    record.severity.as_str(),
                    record.error_kind,
                    record.message,
                    record.fingerprint
                );
            }
        }
        Ok(())
    }
}
