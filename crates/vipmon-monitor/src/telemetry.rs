//! 애니메이션 성능 텔레메트리 서비스.
//!
//! 작업 측정기 → 제한 큐 → 배치 업로더 → 수집 서버.
//! 프로덕션 환경에서만 활성화되며, 큐 크기가 배치 크기에 도달하면
//! 백그라운드 flush를 시작한다.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};
use vipmon_core::config::{Environment, TelemetryConfig};
use vipmon_core::error::CoreError;
use vipmon_core::models::context::{context_from, ContextMap, ContextValue};
use vipmon_core::models::device::PlatformInfo;
use vipmon_core::models::session::Session;
use vipmon_core::models::telemetry::{PerformanceTier, TelemetryPayload, TelemetryRecord};
use vipmon_core::ports::clock::Clock;
use vipmon_core::ports::collector::{BatchSink, TelemetryCollector};
use vipmon_core::ports::device_info::DeviceInfoProvider;
use vipmon_network::batch_uploader::BatchUploader;

use crate::recorder::OperationRecorder;
use crate::tasks::BackgroundTasks;

/// 편의 래퍼 카테고리
pub mod category {
    pub const SCREEN_TRANSITION: &str = "screen_transition";
    pub const TAB_SWITCH: &str = "tab_switch";
    pub const PLAN_SELECTION: &str = "plan_selection";
    pub const PURCHASE_BUTTON: &str = "purchase_button";
    pub const MODAL_ANIMATION: &str = "modal_animation";
    pub const CHARACTER_CARD: &str = "character_card";
}

/// 텔레메트리 레코드 배치 → 수집 서버 페이로드 어댑터
struct TelemetrySink {
    collector: Arc<dyn TelemetryCollector>,
    session_id: String,
}

#[async_trait]
impl BatchSink<TelemetryRecord> for TelemetrySink {
    async fn deliver(&self, batch: &[TelemetryRecord]) -> Result<(), CoreError> {
        let payload = TelemetryPayload::new(&self.session_id, batch.to_vec());
        self.collector.send_telemetry(&payload).await
    }
}

/// 등급별 레코드 수
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub excellent: u64,
    pub good: u64,
    pub fair: u64,
    pub poor: u64,
}

impl TierCounts {
    fn add(&mut self, tier: PerformanceTier) {
        match tier {
            PerformanceTier::Excellent => self.excellent += 1,
            PerformanceTier::Good => self.good += 1,
            PerformanceTier::Fair => self.fair += 1,
            PerformanceTier::Poor => self.poor += 1,
        }
    }

    fn total(&self) -> u64 {
        self.excellent + self.good + self.fair + self.poor
    }
}

/// 디버그용 성능 요약 (부수 효과 없음)
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub enabled: bool,
    pub session_id: String,
    pub active_operations: usize,
    pub queue_size: usize,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub records_sent: u64,
    pub records_dropped: u64,
    pub records_by_tier: TierCounts,
    pub average_duration_ms: f64,
    /// 같은 ID로 시작되어 덮어쓴 횟수
    pub id_collisions: u64,
}

#[derive(Default)]
struct DurationStats {
    tiers: TierCounts,
    total_ms: f64,
}

/// 애니메이션 성능 텔레메트리
pub struct AnimationTelemetry {
    enabled: AtomicBool,
    session_id: String,
    config: TelemetryConfig,
    recorder: Mutex<OperationRecorder>,
    uploader: Arc<BatchUploader<TelemetryRecord>>,
    durations: Mutex<DurationStats>,
    collisions: AtomicU64,
    next_seq: AtomicU64,
    /// flush 작업
    tasks: BackgroundTasks,
    /// 자동 종료 타이머
    timers: BackgroundTasks,
}

impl AnimationTelemetry {
    /// 새 텔레메트리 서비스 생성
    ///
    /// `Environment::Production`일 때만 활성화된다 (`set_enabled`로 재정의 가능).
    pub fn new(
        collector: Arc<dyn TelemetryCollector>,
        clock: Arc<dyn Clock>,
        device: Arc<dyn DeviceInfoProvider>,
        session: &Session,
        config: TelemetryConfig,
        environment: Environment,
    ) -> Self {
        let platform = PlatformInfo::from(&device.snapshot());
        let sink = Arc::new(TelemetrySink {
            collector,
            session_id: session.id.clone(),
        });
        let uploader = Arc::new(BatchUploader::new(sink, config.max_queue_size));
        let enabled = environment == Environment::Production;

        info!(
            "텔레메트리 초기화: enabled={enabled}, batch_size={}, queue={}",
            config.batch_size, config.max_queue_size
        );

        Self {
            enabled: AtomicBool::new(enabled),
            session_id: session.id.clone(),
            config,
            recorder: Mutex::new(OperationRecorder::new(clock, platform)),
            uploader,
            durations: Mutex::new(DurationStats::default()),
            collisions: AtomicU64::new(0),
            next_seq: AtomicU64::new(1),
            tasks: BackgroundTasks::new("telemetry"),
            timers: BackgroundTasks::new("telemetry_timers"),
        }
    }

    /// 활성 상태 재정의 (테스트/디버그용)
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        debug!("텔레메트리 enabled={enabled}");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// 측정 시작. 비활성이면 no-op
    pub fn start_tracking(&self, operation_id: &str, category: &str, context: ContextMap) {
        if !self.is_enabled() {
            return;
        }
        if self.recorder.lock().start(operation_id, category, context) {
            self.collisions.fetch_add(1, Ordering::Relaxed);
            debug!("작업 ID 충돌, 이전 측정 덮어씀: {operation_id}");
        }
    }

    /// 측정 종료. 레코드가 만들어졌으면 `true`
    ///
    /// 비활성이거나 추적 중이 아닌 ID는 조용히 무시한다.
    pub fn end_tracking(&self, operation_id: &str, success: bool, frame_drops: u32) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let Some(record) = self.recorder.lock().end(operation_id, success, frame_drops) else {
            return false;
        };

        {
            let mut durations = self.durations.lock();
            durations.tiers.add(record.performance_tier);
            durations.total_ms += record.duration_ms;
        }

        let size = self.uploader.enqueue(record);
        if size >= self.config.batch_size {
            self.spawn_flush();
        }
        true
    }

    /// 진행 중 작업의 프레임 드롭 기록
    pub fn record_frame_drop(&self, operation_id: &str) {
        if !self.is_enabled() {
            return;
        }
        self.recorder.lock().record_frame_drop(operation_id);
    }

    /// 오래된 미종료 작업 정리
    pub fn prune_stale(&self, max_age: Duration) -> usize {
        let pruned = self.recorder.lock().prune_stale(max_age);
        if pruned > 0 {
            debug!("미종료 작업 {pruned}개 정리");
        }
        pruned
    }

    /// 큐 전체 전송
    pub async fn flush(&self) -> Result<usize, CoreError> {
        self.uploader.flush().await
    }

    fn spawn_flush(&self) {
        let uploader = Arc::clone(&self.uploader);
        self.tasks.spawn("telemetry_flush", async move {
            // 실패 경고는 업로더가 남긴다
            if let Err(e) = uploader.flush().await {
                debug!("배치 크기 도달 flush 실패, 다음 트리거 대기: {e}");
            }
            Ok(())
        });
    }

    // ── 편의 래퍼 ──────────────────────────────────────────────

    /// 화면 진입 애니메이션
    pub fn track_screen_entrance(&self, screen: &str) -> String {
        let id = self.next_id("screen_entrance");
        self.start_tracking(
            &id,
            category::SCREEN_TRANSITION,
            context_from([("screen", screen)]),
        );
        id
    }

    /// 탭 전환 (자동 종료)
    pub fn track_tab_switch(self: &Arc<Self>, from: &str, to: &str) -> String {
        let id = self.next_id("tab_switch");
        self.start_tracking(
            &id,
            category::TAB_SWITCH,
            context_from([("fromTab", from), ("toTab", to)]),
        );
        self.schedule_auto_finalize(&id, self.config.auto_finalize.tab_switch_ms);
        id
    }

    /// 요금제 선택 (자동 종료)
    pub fn track_plan_selection(self: &Arc<Self>, plan_id: &str) -> String {
        let id = self.next_id("plan_selection");
        self.start_tracking(
            &id,
            category::PLAN_SELECTION,
            context_from([("planId", plan_id)]),
        );
        self.schedule_auto_finalize(&id, self.config.auto_finalize.plan_selection_ms);
        id
    }

    /// 구매 버튼 (자동 종료)
    pub fn track_purchase_button(self: &Arc<Self>, plan_id: &str) -> String {
        let id = self.next_id("purchase_button");
        self.start_tracking(
            &id,
            category::PURCHASE_BUTTON,
            context_from([("planId", plan_id)]),
        );
        self.schedule_auto_finalize(&id, self.config.auto_finalize.purchase_button_ms);
        id
    }

    /// 모달 애니메이션
    pub fn track_modal(&self, modal: &str) -> String {
        let id = self.next_id("modal");
        self.start_tracking(
            &id,
            category::MODAL_ANIMATION,
            context_from([("modal", modal)]),
        );
        id
    }

    /// 캐릭터 카드 애니메이션
    pub fn track_character_card(&self, character_id: &str, index: u32) -> String {
        let id = self.next_id("character_card");
        self.start_tracking(
            &id,
            category::CHARACTER_CARD,
            context_from([
                ("characterId", ContextValue::from(character_id)),
                ("index", ContextValue::from(index)),
            ]),
        );
        id
    }

    fn next_id(&self, prefix: &str) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}_{seq}")
    }

    fn schedule_auto_finalize(self: &Arc<Self>, operation_id: &str, delay_ms: u64) {
        if !self.is_enabled() {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let operation_id = operation_id.to_string();
        self.timers.spawn("auto_finalize", async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if let Some(telemetry) = weak.upgrade() {
                if telemetry.end_tracking(&operation_id, true, 0) {
                    debug!("자동 종료: {operation_id} ({delay_ms}ms)");
                }
            }
            Ok(())
        });
    }

    // ── 조회 ──────────────────────────────────────────────────

    /// 전송 대기 중인 레코드 (오래된 것부터)
    pub fn pending_records(&self) -> Vec<TelemetryRecord> {
        self.uploader.snapshot()
    }

    /// 성능 요약
    pub fn performance_summary(&self) -> PerformanceSummary {
        let stats = self.uploader.stats();
        let (tiers, total_ms) = {
            let durations = self.durations.lock();
            (durations.tiers.clone(), durations.total_ms)
        };
        let count = tiers.total();
        let average_duration_ms = if count == 0 {
            0.0
        } else {
            (total_ms / count as f64 * 100.0).round() / 100.0
        };

        PerformanceSummary {
            enabled: self.is_enabled(),
            session_id: self.session_id.clone(),
            active_operations: self.recorder.lock().active_count(),
            queue_size: stats.queue_size,
            batches_sent: stats.sent_batches,
            batches_failed: stats.failed_batches,
            records_sent: stats.sent_records,
            records_dropped: stats.dropped_records,
            records_by_tier: tiers,
            average_duration_ms,
            id_collisions: self.collisions.load(Ordering::Relaxed),
        }
    }

    /// 종료: 타이머 취소 → 마지막 flush → 백그라운드 작업 대기
    ///
    /// 이후 기록 호출은 no-op.
    pub async fn dispose(&self) {
        self.timers.abort_all();
        self.timers.drain().await;
        self.tasks.drain().await;

        if let Err(e) = self.uploader.flush().await {
            debug!("종료 flush 실패: {e}");
        }
        self.set_enabled(false);
        info!("텔레메트리 종료");
    }
}
