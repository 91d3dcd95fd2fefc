//! 애니메이션/성능 텔레메트리 모델.
//!
//! 진행 중인 측정(`TrackedOperation`), 확정된 레코드(`TelemetryRecord`),
//! 수집 서버로 보내는 배치 페이로드를 정의.

use serde::{Deserialize, Serialize};

use super::context::ContextMap;
use super::device::PlatformInfo;

/// 프레임 예산 기준 성능 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    /// 1프레임 이내 (≤ 16.67ms)
    Excellent,
    /// 2프레임 이내 (≤ 33.33ms)
    Good,
    /// ≤ 50ms
    Fair,
    /// 50ms 초과
    Poor,
}

impl PerformanceTier {
    /// 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "excellent",
            PerformanceTier::Good => "good",
            PerformanceTier::Fair => "fair",
            PerformanceTier::Poor => "poor",
        }
    }
}

/// 진행 중인 측정 (start ~ end 사이)
#[derive(Debug, Clone)]
pub struct TrackedOperation {
    /// 호출자가 지정한 작업 ID
    pub operation_id: String,
    /// 카테고리 태그 (예: "screen_transition", "tab_switch")
    pub category: String,
    /// 시작 시점 단조 시계값 (밀리초)
    pub started_at_ms: f64,
    /// 추가 컨텍스트
    pub context: ContextMap,
    /// 측정 중 누적된 프레임 드롭 수
    pub frame_drops: u32,
}

/// 확정된 텔레메트리 레코드 (불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub operation_id: String,
    pub category: String,
    /// 소요 시간 (밀리초, 소수점 2자리 반올림, 항상 ≥ 0)
    pub duration_ms: f64,
    pub success: bool,
    pub frame_drops: u32,
    pub performance_tier: PerformanceTier,
    pub platform_info: PlatformInfo,
    #[serde(default)]
    pub context: ContextMap,
    /// 생성 시각 (epoch 밀리초)
    pub created_at_epoch_ms: i64,
}

/// 텔레메트리 배치 페이로드
///
/// `POST <analytics endpoint>` 본문.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPayload {
    /// 페이로드 구분자 (항상 "animation_performance")
    #[serde(rename = "type")]
    pub payload_type: String,
    /// 전송 시각 (epoch 밀리초)
    pub timestamp: i64,
    pub batch: Vec<TelemetryRecord>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

impl TelemetryPayload {
    /// 페이로드 구분자
    pub const PAYLOAD_TYPE: &'static str = "animation_performance";

    /// 현재 시각으로 페이로드 생성
    pub fn new(session_id: &str, batch: Vec<TelemetryRecord>) -> Self {
        Self {
            payload_type: Self::PAYLOAD_TYPE.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            batch,
            session_id: session_id.to_string(),
        }
    }
}

/// 소요 시간을 소수점 2자리로 반올림 (음수는 0으로 고정)
pub fn round_duration(duration_ms: f64) -> f64 {
    if !duration_ms.is_finite() || duration_ms <= 0.0 {
        return 0.0;
    }
    (duration_ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_duration(25.0), 25.0);
        assert_eq!(round_duration(12.3456), 12.35);
        assert_eq!(round_duration(-3.0), 0.0);
        assert_eq!(round_duration(f64::NAN), 0.0);
    }

    #[test]
    fn payload_wire_shape() {
        let payload = TelemetryPayload::new("sess_1", vec![]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "animation_performance");
        assert_eq!(json["sessionId"], "sess_1");
        assert!(json["batch"].as_array().unwrap().is_empty());
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }
}
