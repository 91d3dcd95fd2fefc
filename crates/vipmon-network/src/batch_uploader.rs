//! 배치 업로더.
//!
//! 확정된 레코드를 용량 제한 큐에 모아 배치로 전송한다.
//! 전송 실패 시 배치 전체를 큐 앞쪽에 재삽입하고 다음 트리거를 기다린다.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use vipmon_core::error::CoreError;
use vipmon_core::ports::collector::BatchSink;
use vipmon_core::queue::BoundedQueue;
use vipmon_core::DIAGNOSTICS_TARGET;

/// 배치 업로더: 제한 큐 → 배치 전송
///
/// - 큐 변경은 동기 구간에서만 일어나며 `.await` 너머로 락을 들고 있지 않는다
/// - flush 진행 중 다시 호출된 flush는 아무 것도 하지 않는다
/// - 재삽입된 레코드는 새 레코드보다 먼저 전송된다
/// - 전송 중인 배치는 성공 응답 전까지 `snapshot_with_in_flight`에 남는다
pub struct BatchUploader<T> {
    sink: Arc<dyn BatchSink<T>>,
    queue: Mutex<BoundedQueue<T>>,
    /// 전송 중인 배치. 락 순서는 항상 `queue` → `pending`
    pending: Mutex<Vec<T>>,
    in_flight: AtomicBool,
    sent_batches: AtomicU64,
    failed_batches: AtomicU64,
    sent_records: AtomicU64,
    dropped_records: AtomicU64,
}

/// flush 진행 플래그 해제 가드
///
/// future가 전송 도중 취소되면 남은 배치를 큐 앞쪽에 되돌린다.
struct InFlightGuard<'a, T>(&'a BatchUploader<T>);

impl<T> Drop for InFlightGuard<'_, T> {
    fn drop(&mut self) {
        let uploader = self.0;
        {
            let mut queue = uploader.queue.lock();
            let batch = std::mem::take(&mut *uploader.pending.lock());
            if !batch.is_empty() {
                let dropped = queue.requeue_front(batch);
                uploader
                    .dropped_records
                    .fetch_add(dropped as u64, Ordering::Relaxed);
            }
        }
        uploader.in_flight.store(false, Ordering::Release);
    }
}

impl<T> BatchUploader<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// 새 배치 업로더 생성
    pub fn new(sink: Arc<dyn BatchSink<T>>, capacity: usize) -> Self {
        Self {
            sink,
            queue: Mutex::new(BoundedQueue::new(capacity)),
            pending: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            sent_batches: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
            sent_records: AtomicU64::new(0),
            dropped_records: AtomicU64::new(0),
        }
    }

    /// 실패 배치 재삽입 상한 설정
    pub fn with_retry_cap(self, retry_cap: usize) -> Self {
        {
            let mut queue = self.queue.lock();
            let capacity = queue.capacity();
            let restored = queue.drain_all();
            *queue = BoundedQueue::new(capacity).with_retry_cap(retry_cap);
            for record in restored {
                queue.append(record);
            }
        }
        self
    }

    /// 레코드를 큐에 추가하고 현재 큐 크기를 반환
    pub fn enqueue(&self, record: T) -> usize {
        let (size, evicted) = {
            let mut queue = self.queue.lock();
            let evicted = queue.append(record);
            (queue.len(), evicted)
        };

        if evicted > 0 {
            self.dropped_records
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!("큐 용량 초과, 오래된 레코드 {evicted}개 제거");
        }
        debug!("레코드 큐 추가, 현재 크기: {size}");
        size
    }

    /// 여러 레코드를 순서대로 추가 (내구성 미러 복원용)
    pub fn enqueue_many(&self, records: Vec<T>) -> usize {
        let (size, evicted) = {
            let mut queue = self.queue.lock();
            let evicted = queue.extend_restored(records);
            (queue.len(), evicted)
        };

        if evicted > 0 {
            self.dropped_records
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!("복원 중 용량 초과, 레코드 {evicted}개 제거");
        }
        size
    }

    /// 큐 전체를 배치 하나로 전송
    ///
    /// 빈 큐이거나 이미 flush 중이면 전송 없이 `Ok(0)`.
    /// 실패 시 배치를 큐 앞쪽에 되돌리고 에러를 반환한다.
    pub async fn flush(&self) -> Result<usize, CoreError> {
        if self.queue.lock().is_empty() {
            return Ok(0);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("flush 진행 중, 중복 호출 무시");
            return Ok(0);
        }
        let _guard = InFlightGuard(self);

        let batch = {
            let mut queue = self.queue.lock();
            let batch = queue.drain_all();
            self.pending.lock().clone_from(&batch);
            batch
        };
        let count = batch.len();
        if count == 0 {
            return Ok(0);
        }

        match self.sink.deliver(&batch).await {
            Ok(()) => {
                self.pending.lock().clear();
                self.sent_batches.fetch_add(1, Ordering::Relaxed);
                self.sent_records.fetch_add(count as u64, Ordering::Relaxed);
                debug!("배치 전송 성공: {count}개 레코드");
                Ok(count)
            }
            Err(e) => {
                self.failed_batches.fetch_add(1, Ordering::Relaxed);
                self.requeue_failed();
                warn!(target: DIAGNOSTICS_TARGET, "배치 전송 실패 ({count}개 재큐잉): {e}");
                Err(e)
            }
        }
    }

    /// 전송 중이던 배치를 큐 앞쪽에 재삽입
    fn requeue_failed(&self) {
        let dropped = {
            let mut queue = self.queue.lock();
            let batch = std::mem::take(&mut *self.pending.lock());
            queue.requeue_front(batch)
        };
        if dropped > 0 {
            self.dropped_records
                .fetch_add(dropped as u64, Ordering::Relaxed);
            warn!(target: DIAGNOSTICS_TARGET, "재큐잉 용량 초과로 레코드 {dropped}개 제거");
        }
    }

    /// 현재 큐 내용 복제본 (오래된 것부터)
    pub fn snapshot(&self) -> Vec<T> {
        self.queue.lock().snapshot()
    }

    /// 전송 중인 배치 + 큐 내용 복제본 (전송 중인 것이 앞)
    ///
    /// 내구성 미러는 이 뷰를 기록해야 전송 도중 종료돼도 레코드를 잃지 않는다.
    pub fn snapshot_with_in_flight(&self) -> Vec<T> {
        let queue = self.queue.lock();
        let mut records = self.pending.lock().clone();
        records.extend(queue.snapshot());
        records
    }

    /// 현재 큐 크기
    pub fn queue_size(&self) -> usize {
        self.queue.lock().len()
    }

    /// flush 진행 중 여부
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 배치 통계
    pub fn stats(&self) -> BatchStats {
        let (queue_size, capacity) = {
            let queue = self.queue.lock();
            (queue.len(), queue.capacity())
        };
        BatchStats {
            queue_size,
            capacity,
            in_flight: self.is_in_flight(),
            sent_batches: self.sent_batches.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            sent_records: self.sent_records.load(Ordering::Relaxed),
            dropped_records: self.dropped_records.load(Ordering::Relaxed),
        }
    }
}

/// 배치 업로더 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchStats {
    /// 현재 큐 크기
    pub queue_size: usize,
    /// 큐 최대 크기
    pub capacity: usize,
    /// flush 진행 중 여부
    pub in_flight: bool,
    /// 전송 성공 배치 수
    pub sent_batches: u64,
    /// 전송 실패 배치 수
    pub failed_batches: u64,
    /// 전송 성공 레코드 수
    pub sent_records: u64,
    /// 용량 초과로 버려진 레코드 수
    pub dropped_records: u64,
}
