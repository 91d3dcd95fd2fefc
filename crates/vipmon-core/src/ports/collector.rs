//! 수집 서버 전송 포트.
//!
//! 구현: `vipmon-network` crate (reqwest, 콘솔 출력)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::error_report::ErrorPayload;
use crate::models::telemetry::TelemetryPayload;

/// 성능 텔레메트리 수집 서버
///
/// 배치 단위 전체 성공/전체 실패만 존재한다 (부분 승인 없음).
#[async_trait]
pub trait TelemetryCollector: Send + Sync {
    /// 텔레메트리 배치 전송
    async fn send_telemetry(&self, payload: &TelemetryPayload) -> Result<(), CoreError>;
}

/// 에러 모니터링 수집 서버
#[async_trait]
pub trait ErrorCollector: Send + Sync {
    /// 에러 배치 전송
    async fn send_errors(&self, payload: &ErrorPayload) -> Result<(), CoreError>;
}

/// 배치 업로더가 사용하는 레코드 배치 전달 포트
///
/// 파이프라인별 어댑터가 세션/앱 정보를 덧붙여 페이로드로 변환한다.
#[async_trait]
pub trait BatchSink<T>: Send + Sync {
    /// 배치 전달. 실패 시 배치 전체가 재시도 대상이 된다.
    async fn deliver(&self, batch: &[T]) -> Result<(), CoreError>;
}
