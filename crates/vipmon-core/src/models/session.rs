//! 세션 모델.
//!
//! 프로세스당 한 번 생성되며 모든 에러 레코드와 텔레메트리 배치에 포함된다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 프로세스 세션
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// 세션 ID (예: "sess_20260101093000_1a2b3c4d")
    pub id: String,
    /// 세션 시작 시각
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// 새 세션 생성 -- 타임스탬프 + 랜덤 접미사
    pub fn generate() -> Self {
        let started_at = Utc::now();
        let ts = started_at.format("%Y%m%d%H%M%S");
        let rand_part = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("sess_{ts}_{}", &rand_part[..8]),
            started_at,
        }
    }

    /// 지정 ID로 세션 생성 (테스트/복원용)
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now(),
        }
    }

    /// 세션 시작 이후 경과 시간 (밀리초)
    pub fn uptime_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = Session::generate();
        let b = Session::generate();
        assert!(a.id.starts_with("sess_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn uptime_is_non_negative() {
        let session = Session::with_id("sess_test");
        assert!(session.uptime_ms() >= 0);
    }
}
