//! # vipmon-storage
//!
//! 로컬 저장소 어댑터.
//! SQLite 기반 키-값 저장소로 에러 큐의 내구성 미러를 보관하며,
//! 버전 기반 스키마 마이그레이션을 관리한다.
//!
//! ## 모듈
//! - `sqlite`: 키-값 저장소 (`KeyValueStore` 구현)
//! - `migration`: 스키마 마이그레이션

pub mod migration;
pub mod sqlite;
