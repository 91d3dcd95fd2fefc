//! 디바이스 정보 포트.
//!
//! 구현: `vipmon-monitor` crate (sysinfo)

use crate::models::device::DeviceSnapshot;

/// 디바이스/플랫폼 정보 제공자
pub trait DeviceInfoProvider: Send + Sync {
    /// 현재 디바이스 스냅샷
    fn snapshot(&self) -> DeviceSnapshot;
}
