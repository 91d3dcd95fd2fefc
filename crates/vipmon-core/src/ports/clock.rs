//! 시계 포트.
//!
//! 구현: `vipmon-monitor` crate (`SystemClock`, 테스트용 `ManualClock`)

/// 단조 시계
pub trait Clock: Send + Sync {
    /// 임의 기준점 이후 경과 시간 (밀리초, 단조 증가)
    fn now_ms(&self) -> f64;
}
