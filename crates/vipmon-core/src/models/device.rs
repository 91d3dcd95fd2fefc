//! 디바이스/플랫폼 정보 모델.

use serde::{Deserialize, Serialize};

/// 에러 레코드에 첨부되는 디바이스 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    /// 플랫폼 (예: "linux", "ios")
    pub platform: String,
    /// OS 버전
    pub os_version: String,
    /// 앱 버전
    pub app_version: String,
    /// 빌드 식별자
    pub build: String,
}

/// 텔레메트리 레코드에 첨부되는 플랫폼 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    /// 플랫폼
    pub os: String,
    /// OS 버전
    pub os_version: String,
}

impl From<&DeviceSnapshot> for PlatformInfo {
    fn from(snapshot: &DeviceSnapshot) -> Self {
        Self {
            os: snapshot.platform.clone(),
            os_version: snapshot.os_version.clone(),
        }
    }
}

impl DeviceSnapshot {
    /// 알 수 없는 디바이스 (초기화 전 사용)
    pub fn unknown(app_version: &str) -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            os_version: "unknown".to_string(),
            app_version: app_version.to_string(),
            build: "unknown".to_string(),
        }
    }
}
