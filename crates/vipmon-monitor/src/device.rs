//! 디바이스 정보 수집.
//!
//! `DeviceInfoProvider` 포트 구현. sysinfo 기반 OS 이름/버전 조회.

use sysinfo::System;
use tracing::debug;
use vipmon_core::models::device::DeviceSnapshot;
use vipmon_core::ports::device_info::DeviceInfoProvider;

/// sysinfo 기반 디바이스 정보 제공자
///
/// OS 정보는 프로세스 수명 동안 바뀌지 않으므로 생성 시 한 번만 조회한다.
pub struct SysInfoDeviceProvider {
    snapshot: DeviceSnapshot,
}

impl SysInfoDeviceProvider {
    pub fn new(app_version: &str) -> Self {
        let distro = System::name().unwrap_or_else(|| "unknown".to_string());
        let os_version = System::os_version()
            .map(|v| format!("{distro} {v}"))
            .unwrap_or(distro);
        let build = match System::kernel_version() {
            Some(kernel) => format!("{}+{kernel}", env!("CARGO_PKG_VERSION")),
            None => env!("CARGO_PKG_VERSION").to_string(),
        };

        let snapshot = DeviceSnapshot {
            platform: std::env::consts::OS.to_string(),
            os_version,
            app_version: app_version.to_string(),
            build,
        };
        debug!(
            "디바이스 정보: {} {} (build {})",
            snapshot.platform, snapshot.os_version, snapshot.build
        );

        Self { snapshot }
    }
}

impl DeviceInfoProvider for SysInfoDeviceProvider {
    fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot.clone()
    }
}

/// 고정 디바이스 정보
#[derive(Debug, Clone)]
pub struct StaticDeviceInfo(pub DeviceSnapshot);

impl DeviceInfoProvider for StaticDeviceInfo {
    fn snapshot(&self) -> DeviceSnapshot {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysinfo_snapshot_fields() {
        let provider = SysInfoDeviceProvider::new("2.1.0");
        let snapshot = provider.snapshot();
        assert_eq!(snapshot.platform, std::env::consts::OS);
        assert_eq!(snapshot.app_version, "2.1.0");
        assert!(snapshot.build.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(!snapshot.os_version.is_empty());
    }

    #[test]
    fn static_provider_returns_given_snapshot() {
        let provider = StaticDeviceInfo(DeviceSnapshot::unknown("1.0.0"));
        assert_eq!(provider.snapshot().app_version, "1.0.0");
    }
}
