//! 작업 측정기.
//!
//! 이름 붙은 작업의 start/end 쌍을 추적하고 소요 시간을 계산해
//! 확정된 `TelemetryRecord`를 만든다. 큐/전송에는 관여하지 않는 순수 상태 머신.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use vipmon_core::classifier::classify_performance;
use vipmon_core::models::context::ContextMap;
use vipmon_core::models::device::PlatformInfo;
use vipmon_core::models::telemetry::{round_duration, TelemetryRecord, TrackedOperation};
use vipmon_core::ports::clock::Clock;

/// 진행 중 작업 추적기
pub struct OperationRecorder {
    clock: Arc<dyn Clock>,
    platform: PlatformInfo,
    active: HashMap<String, TrackedOperation>,
}

impl OperationRecorder {
    pub fn new(clock: Arc<dyn Clock>, platform: PlatformInfo) -> Self {
        Self {
            clock,
            platform,
            active: HashMap::new(),
        }
    }

    /// 측정 시작. 같은 ID가 이미 있으면 덮어쓰고 `true` 반환
    pub fn start(&mut self, operation_id: &str, category: &str, context: ContextMap) -> bool {
        let operation = TrackedOperation {
            operation_id: operation_id.to_string(),
            category: category.to_string(),
            started_at_ms: self.clock.now_ms(),
            context,
            frame_drops: 0,
        };
        self.active
            .insert(operation_id.to_string(), operation)
            .is_some()
    }

    /// 측정 종료. 추적 중이 아니면 `None`
    ///
    /// 레코드의 프레임 드롭 수 = 인자 + 측정 중 누적값.
    pub fn end(
        &mut self,
        operation_id: &str,
        success: bool,
        frame_drops: u32,
    ) -> Option<TelemetryRecord> {
        let operation = self.active.remove(operation_id)?;
        let duration_ms = round_duration(self.clock.now_ms() - operation.started_at_ms);

        Some(TelemetryRecord {
            operation_id: operation.operation_id,
            category: operation.category,
            duration_ms,
            success,
            frame_drops: frame_drops.saturating_add(operation.frame_drops),
            performance_tier: classify_performance(duration_ms),
            platform_info: self.platform.clone(),
            context: operation.context,
            created_at_epoch_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// 진행 중 작업의 프레임 드롭 카운터 증가. 추적 중이면 `true`
    pub fn record_frame_drop(&mut self, operation_id: &str) -> bool {
        match self.active.get_mut(operation_id) {
            Some(operation) => {
                operation.frame_drops = operation.frame_drops.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// `max_age`보다 오래된 작업을 레코드 없이 제거하고 제거 수를 반환
    pub fn prune_stale(&mut self, max_age: Duration) -> usize {
        let cutoff = self.clock.now_ms() - max_age.as_secs_f64() * 1000.0;
        let before = self.active.len();
        self.active.retain(|_, op| op.started_at_ms >= cutoff);
        before - self.active.len()
    }

    /// 추적 중인지
    pub fn is_tracking(&self, operation_id: &str) -> bool {
        self.active.contains_key(operation_id)
    }

    /// 진행 중 작업 수
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use vipmon_core::models::context::context_from;
    use vipmon_core::models::telemetry::PerformanceTier;

    fn recorder() -> (Arc<ManualClock>, OperationRecorder) {
        let clock = Arc::new(ManualClock::new(0.0));
        let platform = PlatformInfo {
            os: "ios".to_string(),
            os_version: "17.4".to_string(),
        };
        (clock.clone(), OperationRecorder::new(clock, platform))
    }

    #[test]
    fn start_end_produces_record() {
        let (clock, mut recorder) = recorder();
        recorder.start("op1", "screen_transition", ContextMap::new());
        clock.set(25.0);

        let record = recorder.end("op1", true, 2).unwrap();
        assert_eq!(record.duration_ms, 25.0);
        assert_eq!(record.performance_tier, PerformanceTier::Good);
        assert!(record.success);
        assert_eq!(record.frame_drops, 2);
        assert_eq!(record.platform_info.os, "ios");
        assert_eq!(recorder.active_count(), 0);
    }

    #[test]
    fn end_untracked_is_none() {
        let (_, mut recorder) = recorder();
        assert!(recorder.end("never_started", true, 0).is_none());
        assert!(!recorder.record_frame_drop("never_started"));
    }

    #[test]
    fn second_end_is_none() {
        let (_, mut recorder) = recorder();
        recorder.start("op", "tab_switch", ContextMap::new());
        assert!(recorder.end("op", true, 0).is_some());
        assert!(recorder.end("op", true, 0).is_none());
    }

    #[test]
    fn duration_rounded_and_non_negative() {
        let (clock, mut recorder) = recorder();
        clock.set(100.0);
        recorder.start("op", "modal_animation", ContextMap::new());
        clock.set(112.3456);
        assert_eq!(recorder.end("op", true, 0).unwrap().duration_ms, 12.35);

        // 시계가 거꾸로 가도 0 미만이 되지 않는다
        recorder.start("back", "modal_animation", ContextMap::new());
        clock.set(50.0);
        assert_eq!(recorder.end("back", false, 0).unwrap().duration_ms, 0.0);
    }

    #[test]
    fn collision_overwrites_start_time() {
        let (clock, mut recorder) = recorder();
        assert!(!recorder.start("dup", "tab_switch", ContextMap::new()));
        clock.set(40.0);
        assert!(recorder.start("dup", "tab_switch", ContextMap::new()));
        clock.set(50.0);

        let record = recorder.end("dup", true, 0).unwrap();
        assert_eq!(record.duration_ms, 10.0);
        assert_eq!(recorder.active_count(), 0);
    }

    #[test]
    fn frame_drops_accumulate() {
        let (clock, mut recorder) = recorder();
        recorder.start(
            "card",
            "character_card",
            context_from([("characterId", "c1")]),
        );
        assert!(recorder.record_frame_drop("card"));
        assert!(recorder.record_frame_drop("card"));
        clock.set(70.0);

        let record = recorder.end("card", true, 1).unwrap();
        assert_eq!(record.frame_drops, 3);
        assert_eq!(record.performance_tier, PerformanceTier::Poor);
        assert_eq!(record.context["characterId"].as_str(), Some("c1"));
    }

    #[test]
    fn prune_stale_drops_without_record() {
        let (clock, mut recorder) = recorder();
        recorder.start("old", "screen_transition", ContextMap::new());
        clock.set(5_000.0);
        recorder.start("fresh", "screen_transition", ContextMap::new());
        clock.set(6_000.0);

        assert_eq!(recorder.prune_stale(Duration::from_secs(3)), 1);
        assert!(!recorder.is_tracking("old"));
        assert!(recorder.is_tracking("fresh"));
        assert!(recorder.end("old", true, 0).is_none());
    }
}
