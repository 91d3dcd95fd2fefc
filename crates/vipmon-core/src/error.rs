//! VIPMON 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 에러 타입으로 실패를 보고한다.
//! 공개 기록 API는 호출자에게 에러를 전파하지 않으며,
//! 이 타입은 flush/저장소/전송 경계에서만 사용된다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 인증 실패 (API 키 거부 등)
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 로컬 저장소 실패
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 파이프라인이 아직 Ready 상태가 아님
    #[error("파이프라인 미초기화: {0}")]
    NotReady(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}
