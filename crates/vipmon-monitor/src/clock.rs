//! 단조 시계 구현.
//!
//! `SystemClock`은 tokio 시계를 사용하므로 `tokio::time::pause()` 테스트에서도
//! 타이머와 측정값이 함께 움직인다.

use parking_lot::Mutex;
use tokio::time::Instant;
use vipmon_core::ports::clock::Clock;

/// 프로세스 시계: 생성 시점 기준 경과 밀리초
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// 수동 시계 (테스트용)
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now_ms: Mutex::new(start_ms),
        }
    }

    /// 시각 지정
    pub fn set(&self, now_ms: f64) {
        *self.now_ms.lock() = now_ms;
    }

    /// 시각 전진
    pub fn advance(&self, delta_ms: f64) {
        *self.now_ms.lock() += delta_ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *self.now_ms.lock()
    }
}
