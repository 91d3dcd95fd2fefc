//! # vipmon-monitor
//!
//! 텔레메트리/에러 모니터링 파이프라인.
//! 코어 포트(수집기, 저장소, 시계, 디바이스 정보)를 주입받아 동작하는
//! 명시적으로 생성되는 서비스 객체를 제공한다.
//!
//! ## 모듈
//!
//! - `recorder`: 진행 중 작업 추적 → 확정 레코드
//! - `telemetry`: 애니메이션 성능 텔레메트리 (배치 크기 트리거, 자동 종료 타이머)
//! - `error_monitor`: 에러 모니터 (상태 머신, 내구성 미러, 주기 flush, 즉시 전송)
//! - `hooks`: 전역 panic/rejection/콘솔 에러 훅 체인
//! - `tasks`: 백그라운드 작업 집합 (`JoinSet`)
//! - `clock`, `device`: 시계/디바이스 정보 구현

pub mod clock;
pub mod device;
pub mod error_monitor;
pub mod hooks;
pub mod recorder;
pub mod tasks;
pub mod telemetry;
