//! # vipmon-core
//!
//! VIPMON 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 텔레메트리/에러 모니터링 파이프라인이 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 도메인 데이터 구조체 (serde Serialize/Deserialize)
//! - [`ports`]: Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 모니터링 설정 구조체
//! - [`config_manager`]: 설정 파일 관리 (로드/저장)
//! - [`classifier`]: 성능 등급/심각도/지문 순수 함수
//! - [`queue`]: 용량 제한 FIFO 큐 (오래된 항목부터 제거)

pub mod classifier;
pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
pub mod queue;

/// 내부 진단 로그 target.
///
/// 파이프라인 자체의 경고는 이 target으로만 기록하며,
/// 콘솔 에러 가로채기 레이어는 이 target을 무시한다 (피드백 루프 방지).
pub const DIAGNOSTICS_TARGET: &str = "vipmon::diagnostics";
