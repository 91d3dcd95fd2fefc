//! 백그라운드 작업 관리.
//!
//! 결과를 기다리지 않는 비동기 작업(미러 기록, 즉시 전송, 자동 종료 타이머)을
//! `JoinSet`에 모아 두고 종료 시 drain/abort 할 수 있게 한다.
//! 실패는 진단 채널로만 기록하며 에러 모니터로 되돌리지 않는다.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};
use vipmon_core::error::CoreError;
use vipmon_core::DIAGNOSTICS_TARGET;

use crate::hooks::GlobalHooks;

/// 백그라운드 작업 집합
pub struct BackgroundTasks {
    name: &'static str,
    set: Mutex<JoinSet<()>>,
    /// 런타임 밖(예: 일반 스레드의 panic hook)에서 spawn할 때 사용
    handle: Option<Handle>,
}

impl BackgroundTasks {
    /// 새 작업 집합. 런타임 안에서 생성하면 그 런타임 핸들을 기억한다
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            set: Mutex::new(JoinSet::new()),
            handle: Handle::try_current().ok(),
        }
    }

    /// 작업 시작. `Err` 결과는 진단 채널에 경고로 남는다
    pub fn spawn<F>(&self, label: &'static str, task: F) -> bool
    where
        F: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let name = self.name;
        self.spawn_raw(label, async move {
            if let Err(e) = task.await {
                warn!(target: DIAGNOSTICS_TARGET, "[{name}] 백그라운드 작업 실패 ({label}): {e}");
            }
        })
    }

    /// 작업 시작. `Err` 결과나 panic을 처리되지 않은 rejection으로 훅 체인에 보고한다
    ///
    /// 본 작업은 별도 태스크에서 돌며, `abort_all`은 감시 태스크만 취소한다.
    pub fn spawn_guarded<F>(&self, label: &'static str, hooks: &Arc<GlobalHooks>, task: F) -> bool
    where
        F: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let hooks = Arc::clone(hooks);
        self.spawn_raw(label, async move {
            match tokio::spawn(task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    hooks.report_rejection(format!("{label}: {e}"));
                }
                Err(e) if e.is_panic() => {
                    hooks.report_rejection(format!("{label}: panic: {e}"));
                }
                Err(e) => debug!("감시 작업 취소됨 ({label}): {e}"),
            }
        })
    }

    fn spawn_raw<F>(&self, label: &'static str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = match Handle::try_current().ok().or_else(|| self.handle.clone()) {
            Some(handle) => handle,
            None => {
                warn!(target: DIAGNOSTICS_TARGET, "[{}] 런타임 없음, 작업 버림: {label}", self.name);
                return false;
            }
        };

        let mut set = self.set.lock();
        // 끝난 작업 정리
        while let Some(result) = set.try_join_next() {
            self.log_join(result);
        }
        set.spawn_on(task, &handle);
        debug!("[{}] 백그라운드 작업 시작: {label} (진행 중 {})", self.name, set.len());
        true
    }

    /// 모든 작업이 끝날 때까지 대기
    ///
    /// drain 도중 새로 시작된 작업도 기다린다.
    pub async fn drain(&self) -> usize {
        let mut joined = 0;
        loop {
            let mut set = std::mem::take(&mut *self.set.lock());
            if set.is_empty() {
                break;
            }
            while let Some(result) = set.join_next().await {
                self.log_join(result);
                joined += 1;
            }
        }
        debug!("[{}] 백그라운드 작업 drain 완료: {joined}개", self.name);
        joined
    }

    /// 모든 작업 취소 (완료 대기는 `drain`)
    pub fn abort_all(&self) {
        self.set.lock().abort_all();
    }

    /// 진행 중 작업 수
    pub fn len(&self) -> usize {
        self.set.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn log_join(&self, result: Result<(), JoinError>) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                debug!("[{}] 작업 취소됨", self.name);
            }
            Err(e) => {
                warn!(target: DIAGNOSTICS_TARGET, "[{}] 작업 panic: {e}", self.name);
            }
        }
    }
}
