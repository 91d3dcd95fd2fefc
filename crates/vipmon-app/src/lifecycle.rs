//! 라이프사이클 관리.
//!
//! 앱 작업을 rejection 훅 감시 아래 실행하고, 종료 시그널을 받으면
//! 종료 신호를 전파한 뒤 두 파이프라인을 정리한다.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};
use vipmon_core::error::CoreError;
use vipmon_monitor::error_monitor::{ErrorMonitor, ErrorMonitorStats};
use vipmon_monitor::hooks::GlobalHooks;
use vipmon_monitor::tasks::BackgroundTasks;
use vipmon_monitor::telemetry::{AnimationTelemetry, PerformanceSummary};

/// 종료 후 파이프라인 요약
#[derive(Debug)]
pub struct ShutdownReport {
    pub telemetry: PerformanceSummary,
    pub errors: ErrorMonitorStats,
}

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    hooks: Arc<GlobalHooks>,
    tasks: BackgroundTasks,
}

impl LifecycleManager {
    pub fn new(hooks: Arc<GlobalHooks>) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
            hooks,
            tasks: BackgroundTasks::new("app"),
        }
    }

    /// 종료 수신기 복제
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// 종료 신호 발송
    pub fn shutdown(&self) {
        info!("종료 신호 발송");
        let _ = self.shutdown_tx.send(true);
    }

    /// 작업이 끝나거나 OS 시그널(SIGINT, SIGTERM)을 받을 때까지 실행
    pub async fn run_until_signal<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        self.run_until(label, task, wait_for_signal()).await;
    }

    /// 감시 작업 실행. `stop`이 먼저 끝나면 종료 신호를 보내고 작업 정리를 기다린다
    ///
    /// 작업의 `Err`와 panic은 rejection 훅으로 에러 모니터에 기록된다.
    async fn run_until<F, S>(&self, label: &'static str, task: F, stop: S)
    where
        F: Future<Output = Result<(), CoreError>> + Send + 'static,
        S: Future<Output = std::io::Result<()>>,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        self.tasks.spawn_guarded(label, &self.hooks, async move {
            let result = task.await;
            let _ = done_tx.send(());
            result
        });

        tokio::select! {
            _ = done_rx => debug!("{label} 작업 종료"),
            result = stop => match result {
                Ok(()) => self.shutdown(),
                // 시그널 없이 작업이 끝날 때까지 계속
                Err(e) => warn!("시그널 핸들러 등록 실패: {e}"),
            },
        }

        // 진행 중인 라운드와 rejection 보고까지 대기
        self.tasks.drain().await;
    }

    /// 종료 신호 전파 후 파이프라인 정리 (타이머 해제 + 마지막 flush)
    pub async fn shutdown_pipelines(
        &self,
        telemetry: &AnimationTelemetry,
        errors: &ErrorMonitor,
    ) -> ShutdownReport {
        if !*self.shutdown_rx.borrow() {
            self.shutdown();
        }
        info!("종료 중...");
        tokio::join!(telemetry.dispose(), errors.dispose());

        ShutdownReport {
            telemetry: telemetry.performance_summary(),
            errors: errors.stats(),
        }
    }
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => info!("SIGINT 수신"),
            _ = sigterm.recv() => info!("SIGTERM 수신"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl+C 수신");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use vipmon_core::config::{Environment, ErrorMonitoringConfig, TelemetryConfig};
    use vipmon_core::models::device::DeviceSnapshot;
    use vipmon_core::models::session::Session;
    use vipmon_monitor::clock::ManualClock;
    use vipmon_monitor::device::StaticDeviceInfo;
    use vipmon_network::console::ConsoleCollector;
    use vipmon_storage::sqlite::SqliteKeyValueStore;

    fn pipelines(hooks: &Arc<GlobalHooks>) -> (Arc<AnimationTelemetry>, Arc<ErrorMonitor>) {
        let collector = Arc::new(ConsoleCollector::new());
        let device = Arc::new(StaticDeviceInfo(DeviceSnapshot::unknown("1.4.0")));
        let session = Session::with_id("sess_lifecycle");
        let telemetry = Arc::new(AnimationTelemetry::new(
            collector.clone(),
            Arc::new(ManualClock::new(0.0)),
            device.clone(),
            &session,
            TelemetryConfig::default(),
            Environment::Development,
        ));
        let errors = Arc::new(ErrorMonitor::new(
            collector,
            Arc::new(SqliteKeyValueStore::open_in_memory().unwrap()),
            device,
            hooks.clone(),
            session,
            ErrorMonitoringConfig::default(),
            "1.4.0",
        ));
        (telemetry, errors)
    }

    #[tokio::test]
    async fn finished_task_returns_without_shutdown() {
        let lm = LifecycleManager::new(Arc::new(GlobalHooks::new()));
        let rx = lm.subscribe();

        lm.run_until("rounds", async { Ok(()) }, std::future::pending())
            .await;
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn signal_broadcasts_shutdown_and_waits_for_task() {
        let lm = LifecycleManager::new(Arc::new(GlobalHooks::new()));
        let mut rx = lm.subscribe();
        let stopped = Arc::new(AtomicBool::new(false));

        let task = {
            let stopped = stopped.clone();
            async move {
                let _ = rx.changed().await;
                stopped.store(true, Ordering::SeqCst);
                Ok(())
            }
        };
        lm.run_until("rounds", task, async { Ok(()) }).await;

        assert!(stopped.load(Ordering::SeqCst));
        assert!(*lm.subscribe().borrow());
    }

    #[tokio::test]
    async fn signal_setup_failure_lets_task_finish() {
        let lm = LifecycleManager::new(Arc::new(GlobalHooks::new()));
        let finished = Arc::new(AtomicBool::new(false));

        let task = {
            let finished = finished.clone();
            async move {
                tokio::task::yield_now().await;
                finished.store(true, Ordering::SeqCst);
                Ok(())
            }
        };
        lm.run_until("rounds", task, async {
            Err(std::io::Error::other("no signal driver"))
        })
        .await;

        assert!(finished.load(Ordering::SeqCst));
        assert!(!*lm.subscribe().borrow());
    }

    #[tokio::test]
    async fn failing_task_is_recorded_and_flushed_on_shutdown() {
        let hooks = Arc::new(GlobalHooks::new());
        let (telemetry, errors) = pipelines(&hooks);
        errors.init().await;
        let lm = LifecycleManager::new(hooks.clone());

        lm.run_until(
            "storefront",
            async { Err(CoreError::Network("catalog fetch reset".to_string())) },
            std::future::pending(),
        )
        .await;

        let queued = errors.queued_records();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].error_kind, "UnhandledRejection");
        assert!(queued[0].message.starts_with("storefront: "));

        let report = lm.shutdown_pipelines(&telemetry, &errors).await;
        assert!(*lm.subscribe().borrow());
        assert_eq!(report.errors.queue_size, 0);
        assert_eq!(report.errors.batches_sent, 1);
        assert!(hooks.rejection.is_empty());
    }

    #[tokio::test]
    async fn panicking_task_is_recorded() {
        let hooks = Arc::new(GlobalHooks::new());
        let (telemetry, errors) = pipelines(&hooks);
        errors.init().await;
        let lm = LifecycleManager::new(hooks);

        lm.run_until(
            "storefront",
            async {
                if true {
                    panic!("plan index out of range");
                }
                Ok(())
            },
            std::future::pending(),
        )
        .await;

        let queued = errors.queued_records();
        assert_eq!(queued.len(), 1);
        assert!(queued[0].message.starts_with("storefront: panic"));
        lm.shutdown_pipelines(&telemetry, &errors).await;
    }
}
