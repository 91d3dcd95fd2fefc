//! 내구성 키-값 저장소 포트.
//!
//! 구현: `vipmon-storage` crate (rusqlite)

use async_trait::async_trait;

use crate::error::CoreError;

/// 문자열 키-값 저장소 (프로세스 재시작 후에도 유지)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 값 조회 (없으면 None)
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;

    /// 값 저장 (기존 값 덮어쓰기)
    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;

    /// 값 삭제 (없어도 성공)
    async fn remove(&self, key: &str) -> Result<(), CoreError>;
}
