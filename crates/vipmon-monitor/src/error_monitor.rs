//! 에러 모니터링 서비스.
//!
//! 에러 입력 → 레코드(분류/지문) → 제한 큐 + 내구성 미러 → 주기적 배치 전송.
//! Critical 레코드는 큐와 별도로 즉시 한 번 더 전송한다 (큐 사본은 유지).
//!
//! 상태: `Uninitialized → Initializing → Ready` (종료 상태 없음)

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use vipmon_core::classifier::{classify_severity, fingerprint, stack_signature};
use vipmon_core::config::ErrorMonitoringConfig;
use vipmon_core::error::CoreError;
use vipmon_core::models::context::{context_from, ContextMap, ContextValue};
use vipmon_core::models::device::DeviceSnapshot;
use vipmon_core::models::error_report::{AppInfo, ErrorInput, ErrorPayload, ErrorRecord, Severity};
use vipmon_core::models::session::Session;
use vipmon_core::ports::collector::{BatchSink, ErrorCollector};
use vipmon_core::ports::device_info::DeviceInfoProvider;
use vipmon_core::ports::storage::KeyValueStore;
use vipmon_core::DIAGNOSTICS_TARGET;
use vipmon_network::batch_uploader::BatchUploader;

use crate::hooks::{GlobalHooks, HandlerId, HookEvent};
use crate::tasks::BackgroundTasks;

/// 파이프라인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// init 전: 에러는 진단 채널로만 출력되고 큐에 쌓이지 않음
    Uninitialized,
    /// init 진행 중: 에러는 대기 목록에 버퍼링
    Initializing,
    /// 큐/미러/flush 전체 동작
    Ready,
}

/// 컨텍스트 `source` 값
pub mod source {
    pub const MANUAL: &str = "manual";
    pub const GLOBAL_HANDLER: &str = "global_handler";
    pub const UNHANDLED_REJECTION: &str = "unhandled_rejection";
    pub const CONSOLE: &str = "console";
}

/// 에러 레코드 배치 → 수집 서버 페이로드 어댑터
struct ErrorSink {
    collector: Arc<dyn ErrorCollector>,
    session_id: String,
    app_info: AppInfo,
}

impl ErrorSink {
    fn payload(&self, errors: Vec<ErrorRecord>) -> ErrorPayload {
        ErrorPayload::new(&self.session_id, self.app_info.clone(), errors)
    }
}

#[async_trait]
impl BatchSink<ErrorRecord> for ErrorSink {
    async fn deliver(&self, batch: &[ErrorRecord]) -> Result<(), CoreError> {
        self.collector.send_errors(&self.payload(batch.to_vec())).await
    }
}

/// 에러 큐 내구성 미러 (단일 키에 큐 전체 JSON 스냅샷)
struct DurableMirror {
    store: Arc<dyn KeyValueStore>,
    key: String,
    /// 기록 직렬화: 늦게 시작한 기록이 최신 스냅샷을 쓴다
    write_lock: tokio::sync::Mutex<()>,
    failures: AtomicU64,
}

impl DurableMirror {
    /// 저장된 큐 로드. 손상된 값은 경고 후 삭제
    async fn load(&self) -> Vec<ErrorRecord> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(target: DIAGNOSTICS_TARGET, "에러 큐 미러 읽기 실패: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<ErrorRecord>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(target: DIAGNOSTICS_TARGET, "에러 큐 미러 손상, 폐기: {e}");
                if let Err(e) = self.store.remove(&self.key).await {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(target: DIAGNOSTICS_TARGET, "손상된 미러 삭제 실패: {e}");
                }
                Vec::new()
            }
        }
    }

    /// 전송 중인 배치와 큐를 합친 스냅샷 기록. 둘 다 비어 있으면 키 삭제
    async fn sync(&self, uploader: &BatchUploader<ErrorRecord>) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let snapshot = uploader.snapshot_with_in_flight();
        let result = if snapshot.is_empty() {
            self.store.remove(&self.key).await
        } else {
            let json = serde_json::to_string(&snapshot)?;
            self.store.set(&self.key, &json).await
        };

        if let Err(e) = &result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(target: DIAGNOSTICS_TARGET, "에러 큐 미러 기록 실패 (메모리 큐 유지): {e}");
        }
        result
    }
}

/// 심각도별 레코드 수
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

/// 디버그용 에러 모니터 통계 (부수 효과 없음)
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMonitorStats {
    pub state: MonitorState,
    pub session_id: String,
    pub queue_size: usize,
    pub pending_during_init: usize,
    pub total_logged: u64,
    pub by_severity: SeverityCounts,
    pub immediate_sends: u64,
    pub immediate_failures: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub records_dropped: u64,
    pub mirror_failures: u64,
    pub uptime_ms: i64,
}

struct Lifecycle {
    state: MonitorState,
    /// Initializing 중 기록된 레코드
    pending: Vec<ErrorRecord>,
}

/// 에러 모니터
pub struct ErrorMonitor {
    session: Session,
    config: ErrorMonitoringConfig,
    device_provider: Arc<dyn DeviceInfoProvider>,
    device: RwLock<DeviceSnapshot>,
    hooks: Arc<GlobalHooks>,
    sink: Arc<ErrorSink>,
    uploader: Arc<BatchUploader<ErrorRecord>>,
    mirror: Arc<DurableMirror>,
    lifecycle: Mutex<Lifecycle>,
    severity_counts: Mutex<SeverityCounts>,
    total_logged: AtomicU64,
    immediate_sends: Arc<AtomicU64>,
    immediate_failures: Arc<AtomicU64>,
    hook_ids: Mutex<Vec<HookRegistration>>,
    flush_timer: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
    tasks: BackgroundTasks,
}

#[derive(Clone, Copy)]
enum HookRegistration {
    Uncaught(HandlerId),
    Rejection(HandlerId),
    Console(HandlerId),
}

impl ErrorMonitor {
    /// 새 에러 모니터 생성 (Uninitialized)
    pub fn new(
        collector: Arc<dyn ErrorCollector>,
        store: Arc<dyn KeyValueStore>,
        device_provider: Arc<dyn DeviceInfoProvider>,
        hooks: Arc<GlobalHooks>,
        session: Session,
        config: ErrorMonitoringConfig,
        app_version: &str,
    ) -> Self {
        let device = DeviceSnapshot::unknown(app_version);
        let sink = Arc::new(ErrorSink {
            collector,
            session_id: session.id.clone(),
            app_info: AppInfo {
                version: app_version.to_string(),
                platform: device.platform.clone(),
            },
        });
        let uploader = Arc::new(
            BatchUploader::new(sink.clone(), config.max_queue_size)
                .with_retry_cap(config.retry_cap),
        );
        let mirror = Arc::new(DurableMirror {
            store,
            key: config.storage_key.clone(),
            write_lock: tokio::sync::Mutex::new(()),
            failures: AtomicU64::new(0),
        });

        Self {
            session,
            config,
            device_provider,
            device: RwLock::new(device),
            hooks,
            sink,
            uploader,
            mirror,
            lifecycle: Mutex::new(Lifecycle {
                state: MonitorState::Uninitialized,
                pending: Vec::new(),
            }),
            severity_counts: Mutex::new(SeverityCounts::default()),
            total_logged: AtomicU64::new(0),
            immediate_sends: Arc::new(AtomicU64::new(0)),
            immediate_failures: Arc::new(AtomicU64::new(0)),
            hook_ids: Mutex::new(Vec::new()),
            flush_timer: Mutex::new(None),
            tasks: BackgroundTasks::new("error_monitor"),
        }
    }

    /// 현재 상태
    pub fn state(&self) -> MonitorState {
        self.lifecycle.lock().state
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    /// 초기화: 디바이스 스냅샷 → 미러 복원 → 훅 등록 → flush 타이머 → Ready
    ///
    /// 두 번째 호출부터는 no-op.
    pub async fn init(self: &Arc<Self>) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != MonitorState::Uninitialized {
                debug!("에러 모니터 이미 초기화됨");
                return;
            }
            lifecycle.state = MonitorState::Initializing;
        }

        *self.device.write() = self.device_provider.snapshot();

        let restored = self.mirror.load().await;
        let restored_count = restored.len();
        if self.uploader.enqueue_many(restored) < restored_count {
            // 용량 초과로 잘린 큐를 미러에도 반영
            let _ = self.mirror.sync(&self.uploader).await;
        }

        self.register_hooks();
        self.start_flush_timer();

        let pending = {
            let mut lifecycle = self.lifecycle.lock();
            let pending = std::mem::take(&mut lifecycle.pending);
            for record in &pending {
                self.uploader.enqueue(record.clone());
            }
            lifecycle.state = MonitorState::Ready;
            pending
        };

        if !pending.is_empty() {
            let _ = self.mirror.sync(&self.uploader).await;
            for record in pending.into_iter().filter(|r| r.severity == Severity::Critical) {
                self.spawn_immediate_send(record);
            }
        }

        info!(
            "에러 모니터 Ready: session={}, 복원 {restored_count}개, flush 주기 {}초",
            self.session.id, self.config.flush_interval_secs
        );
    }

    // ── 기록 ──────────────────────────────────────────────────

    /// 에러 기록. 반환값은 생성된 에러 ID (Uninitialized면 `None`)
    ///
    /// 내구성 미러 기록까지 기다린 뒤 반환한다 (기록 실패는 경고만).
    pub async fn log_error(&self, error: ErrorInput, context: ContextMap) -> Option<String> {
        let (error_id, ready) = self.record(error, context)?;
        if ready {
            let _ = self.mirror.sync(&self.uploader).await;
        }
        Some(error_id)
    }

    /// 동기 기록 (훅/비동기 컨텍스트 밖 호출용). 미러 기록은 백그라운드로
    pub fn capture(&self, error: ErrorInput, context: ContextMap) -> Option<String> {
        let (error_id, ready) = self.record(error, context)?;
        if ready {
            let mirror = Arc::clone(&self.mirror);
            let uploader = Arc::clone(&self.uploader);
            self.tasks.spawn("mirror_write", async move {
                // 실패 경고는 미러가 남긴다
                let _ = mirror.sync(&uploader).await;
                Ok(())
            });
        }
        Some(error_id)
    }

    /// 레코드 생성 및 적재. (에러 ID, Ready 여부)
    fn record(&self, error: ErrorInput, context: ContextMap) -> Option<(String, bool)> {
        let record = {
            let mut lifecycle = self.lifecycle.lock();
            let state = lifecycle.state;
            match state {
                MonitorState::Uninitialized => {
                    warn!(
                        target: DIAGNOSTICS_TARGET,
                        "에러 모니터 초기화 전 에러 (큐 미적재): {}: {}", error.kind, error.message
                    );
                    return None;
                }
                MonitorState::Initializing => {
                    let record = self.build_record(error, context);
                    self.count(&record);
                    let error_id = record.error_id.clone();
                    lifecycle.pending.push(record);
                    return Some((error_id, false));
                }
                MonitorState::Ready => {
                    drop(lifecycle);
                    self.build_record(error, context)
                }
            }
        };

        self.count(&record);
        let error_id = record.error_id.clone();
        debug!(
            "에러 기록: [{}] {} ({})",
            record.severity.as_str(),
            record.error_kind,
            record.fingerprint
        );

        let critical = record.severity == Severity::Critical;
        if critical {
            self.uploader.enqueue(record.clone());
            self.spawn_immediate_send(record);
        } else {
            self.uploader.enqueue(record);
        }
        Some((error_id, true))
    }

    fn build_record(&self, error: ErrorInput, context: ContextMap) -> ErrorRecord {
        let device = self.device.read().clone();

        // 시스템 필드 위에 호출자 필드를 덮어쓴다
        let mut merged = context_from([
            ("source", source::MANUAL),
            ("platform", device.platform.as_str()),
        ]);
        merged.extend(context);

        let severity = classify_severity(&error.kind, &error.message, &merged);
        let signature = stack_signature(error.stack.as_deref());
        let fingerprint = fingerprint(&error.kind, &error.message, &signature);

        ErrorRecord {
            error_id: uuid::Uuid::new_v4().to_string(),
            message: error.message,
            error_kind: error.kind,
            stack_trace: error.stack,
            context: merged,
            session_id: self.session.id.clone(),
            created_at_epoch_ms: chrono::Utc::now().timestamp_millis(),
            app_uptime_ms: self.session.uptime_ms(),
            device,
            severity,
            fingerprint,
        }
    }

    fn count(&self, record: &ErrorRecord) {
        self.total_logged.fetch_add(1, Ordering::Relaxed);
        let mut counts = self.severity_counts.lock();
        match record.severity {
            Severity::Low => counts.low += 1,
            Severity::Medium => counts.medium += 1,
            Severity::High => counts.high += 1,
            Severity::Critical => counts.critical += 1,
        }
    }

    /// 단일 레코드 즉시 전송 (큐 사본은 그대로 둔다)
    fn spawn_immediate_send(&self, record: ErrorRecord) {
        let sink = Arc::clone(&self.sink);
        let sent = Arc::clone(&self.immediate_sends);
        let failed = Arc::clone(&self.immediate_failures);
        self.tasks.spawn("immediate_send", async move {
            let error_id = record.error_id.clone();
            match sink.deliver(std::slice::from_ref(&record)).await {
                Ok(()) => {
                    sent.fetch_add(1, Ordering::Relaxed);
                    debug!("Critical 에러 즉시 전송: {error_id}");
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: DIAGNOSTICS_TARGET,
                        "Critical 에러 즉시 전송 실패 (주기 flush로 재시도): {error_id}: {e}"
                    );
                }
            }
            Ok(())
        });
    }

    // ── 편의 래퍼 ──────────────────────────────────────────────

    /// VIP 화면 에러
    pub async fn log_vip_screen_error(&self, error: ErrorInput, screen: &str) -> Option<String> {
        let context = context_from([("errorType", "vip_screen"), ("screen", screen)]);
        self.log_error(error, context).await
    }

    /// 구매 에러
    pub async fn log_purchase_error(&self, error: ErrorInput, plan_id: &str) -> Option<String> {
        let context = context_from([("errorType", "purchase"), ("planId", plan_id)]);
        self.log_error(error, context).await
    }

    /// 애니메이션 에러
    pub async fn log_animation_error(
        &self,
        error: ErrorInput,
        animation: &str,
    ) -> Option<String> {
        let context = context_from([("errorType", "animation"), ("animationType", animation)]);
        self.log_error(error, context).await
    }

    /// 네트워크 에러
    pub async fn log_network_error(
        &self,
        error: ErrorInput,
        url: &str,
        status: Option<u16>,
    ) -> Option<String> {
        let mut context = context_from([("errorType", "network"), ("url", url)]);
        if let Some(status) = status {
            context.insert("status".to_string(), ContextValue::from(status));
        }
        self.log_error(error, context).await
    }

    /// 접근성 에러
    pub async fn log_accessibility_error(
        &self,
        error: ErrorInput,
        feature: &str,
    ) -> Option<String> {
        let context = context_from([("errorType", "accessibility"), ("feature", feature)]);
        self.log_error(error, context).await
    }

    // ── flush ─────────────────────────────────────────────────

    /// 큐 전체 전송
    ///
    /// 성공하면 미러를 비우고, 그 사이 새로 쌓인 레코드가 있으면 다시 기록한다.
    /// 실패하면 재삽입된 큐 상태로 미러를 맞춘다.
    pub async fn flush(&self) -> Result<usize, CoreError> {
        if self.state() != MonitorState::Ready {
            return Ok(0);
        }

        match self.uploader.flush().await {
            Ok(0) => Ok(0),
            Ok(sent) => {
                let _ = self.mirror.sync(&self.uploader).await;
                info!("에러 배치 전송 완료: {sent}개");
                Ok(sent)
            }
            Err(e) => {
                let _ = self.mirror.sync(&self.uploader).await;
                Err(e)
            }
        }
    }

    fn start_flush_timer(self: &Arc<Self>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let weak = Arc::downgrade(self);
        let period = self.config.flush_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(monitor) = weak.upgrade() else { break };
                        if let Err(e) = monitor.flush().await {
                            debug!("주기 flush 실패, 다음 주기 대기: {e}");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("주기 flush 타이머 종료");
                        break;
                    }
                }
            }
        });

        *self.flush_timer.lock() = Some((shutdown_tx, handle));
    }

    // ── 전역 훅 ───────────────────────────────────────────────

    fn register_hooks(self: &Arc<Self>) {
        let mut ids = self.hook_ids.lock();

        let weak = Arc::downgrade(self);
        ids.push(HookRegistration::Uncaught(self.hooks.uncaught.register(
            move |event: &HookEvent| {
                if let Some(monitor) = weak.upgrade() {
                    let context = context_from([
                        ("source", ContextValue::from(source::GLOBAL_HANDLER)),
                        ("isFatal", ContextValue::from(event.is_fatal)),
                    ]);
                    monitor.capture(hook_input(event), context);
                }
            },
        )));

        let weak = Arc::downgrade(self);
        ids.push(HookRegistration::Rejection(self.hooks.rejection.register(
            move |event: &HookEvent| {
                if let Some(monitor) = weak.upgrade() {
                    let context = context_from([("source", source::UNHANDLED_REJECTION)]);
                    monitor.capture(hook_input(event), context);
                }
            },
        )));

        let weak = Arc::downgrade(self);
        ids.push(HookRegistration::Console(self.hooks.console.register(
            move |event: &HookEvent| {
                if let Some(monitor) = weak.upgrade() {
                    let context = context_from([("source", source::CONSOLE)]);
                    monitor.capture(hook_input(event), context);
                }
            },
        )));

        debug!("전역 훅 핸들러 {}개 등록", ids.len());
    }

    fn unregister_hooks(&self) {
        for registration in self.hook_ids.lock().drain(..) {
            match registration {
                HookRegistration::Uncaught(id) => self.hooks.uncaught.unregister(id),
                HookRegistration::Rejection(id) => self.hooks.rejection.unregister(id),
                HookRegistration::Console(id) => self.hooks.console.unregister(id),
            };
        }
    }

    // ── 조회/종료 ─────────────────────────────────────────────

    /// 전송 대기 중인 레코드 (오래된 것부터)
    pub fn queued_records(&self) -> Vec<ErrorRecord> {
        self.uploader.snapshot()
    }

    /// 통계
    pub fn stats(&self) -> ErrorMonitorStats {
        let batch = self.uploader.stats();
        let (state, pending_during_init) = {
            let lifecycle = self.lifecycle.lock();
            (lifecycle.state, lifecycle.pending.len())
        };

        ErrorMonitorStats {
            state,
            session_id: self.session.id.clone(),
            queue_size: batch.queue_size,
            pending_during_init,
            total_logged: self.total_logged.load(Ordering::Relaxed),
            by_severity: self.severity_counts.lock().clone(),
            immediate_sends: self.immediate_sends.load(Ordering::Relaxed),
            immediate_failures: self.immediate_failures.load(Ordering::Relaxed),
            batches_sent: batch.sent_batches,
            batches_failed: batch.failed_batches,
            records_dropped: batch.dropped_records,
            mirror_failures: self.mirror.failures.load(Ordering::Relaxed),
            uptime_ms: self.session.uptime_ms(),
        }
    }

    /// 종료: 훅 해제 → 타이머 중지 → 백그라운드 작업 대기 → 마지막 flush
    pub async fn dispose(&self) {
        self.unregister_hooks();

        let timer = self.flush_timer.lock().take();
        if let Some((shutdown_tx, handle)) = timer {
            let _ = shutdown_tx.send(true);
            if let Err(e) = handle.await {
                debug!("flush 타이머 join 실패: {e}");
            }
        }

        self.tasks.drain().await;
        if let Err(e) = self.flush().await {
            debug!("종료 flush 실패 (미러에 보존): {e}");
        }
        self.tasks.drain().await;
        info!("에러 모니터 종료");
    }
}

fn hook_input(event: &HookEvent) -> ErrorInput {
    ErrorInput {
        kind: event.kind.clone(),
        message: event.message.clone(),
        stack: event.stack.clone(),
    }
}
