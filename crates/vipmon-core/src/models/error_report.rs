//! 에러 모니터링 모델.
//!
//! 호출자가 넘기는 에러 입력(`ErrorInput`), 확정된 레코드(`ErrorRecord`),
//! 수집 서버로 보내는 배치 페이로드를 정의.

use serde::{Deserialize, Serialize};

use super::context::ContextMap;
use super::device::DeviceSnapshot;

/// 에러 심각도 (정렬 가능: Low < Medium < High < Critical)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// 기록할 에러 (원시 입력)
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInput {
    /// 에러 종류 이름 (예: "TypeError", "PurchaseError")
    pub kind: String,
    /// 에러 메시지
    pub message: String,
    /// 스택 트레이스 (없을 수 있음)
    pub stack: Option<String>,
}

impl ErrorInput {
    /// 종류와 메시지로 생성
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// 스택 트레이스 첨부
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Rust 에러 값에서 생성: 종류 이름은 타입명의 마지막 경로 세그먼트
    pub fn from_error<E: std::error::Error>(error: &E) -> Self {
        let type_name = std::any::type_name::<E>();
        let kind = type_name
            .split('<')
            .next()
            .and_then(|path| path.rsplit("::").next())
            .unwrap_or(type_name);
        Self::new(kind, error.to_string())
    }
}

/// 확정된 에러 레코드 (불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// 전역 고유 ID (UUID v4)
    pub error_id: String,
    pub message: String,
    pub error_kind: String,
    pub stack_trace: Option<String>,
    /// 호출자 컨텍스트 + 시스템 컨텍스트 병합 결과
    #[serde(default)]
    pub context: ContextMap,
    pub session_id: String,
    /// 생성 시각 (epoch 밀리초)
    pub created_at_epoch_ms: i64,
    /// 앱 가동 시간 (밀리초)
    pub app_uptime_ms: i64,
    pub device: DeviceSnapshot,
    pub severity: Severity,
    /// 그룹핑용 지문 (메타데이터 전용, 중복 제거에 사용하지 않음)
    pub fingerprint: String,
}

/// 에러 페이로드의 앱 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub version: String,
    pub platform: String,
}

/// 에러 배치 페이로드
///
/// `POST <error-monitoring endpoint>` 본문.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub errors: Vec<ErrorRecord>,
    pub session_id: String,
    pub app_info: AppInfo,
    /// 전송 시각 (epoch 밀리초)
    pub timestamp: i64,
}

impl ErrorPayload {
    /// 현재 시각으로 페이로드 생성
    pub fn new(session_id: &str, app_info: AppInfo, errors: Vec<ErrorRecord>) -> Self {
        Self {
            errors,
            session_id: session_id.to_string(),
            app_info,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
