//! SQLite 키-값 저장소 어댑터.
//!
//! `KeyValueStore` 포트 구현. 에러 큐 전체 스냅샷을 단일 키에 덮어쓴다.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use vipmon_core::error::CoreError;
use vipmon_core::ports::storage::KeyValueStore;

use crate::migration;

/// SQLite 키-값 저장소: `KeyValueStore` 포트 구현
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// 파일 기반 저장소 생성
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Storage(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            ",
        )
        .map_err(|e| CoreError::Storage(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        info!("SQLite 키-값 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 인메모리 저장소 생성 (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Storage(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T, F>(&self, op: F) -> Result<T, CoreError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Storage(format!("DB 잠금 실패: {e}")))?;
        op(&conn).map_err(|e| CoreError::Storage(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
        })?;
        debug!("키 저장: {key} ({} bytes)", value.len());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CoreError> {
        let removed =
            self.with_conn(|conn| conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key]))?;
        debug!("키 삭제: {key} (행 {removed})");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let store = SqliteKeyValueStore::open_in_memory().unwrap();
        assert_eq!(store.get("queue").await.unwrap(), None);

        store.set("queue", "[1,2]").await.unwrap();
        assert_eq!(store.get("queue").await.unwrap().as_deref(), Some("[1,2]"));

        store.set("queue", "[3]").await.unwrap();
        assert_eq!(store.get("queue").await.unwrap().as_deref(), Some("[3]"));

        store.remove("queue").await.unwrap();
        assert_eq!(store.get("queue").await.unwrap(), None);
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let store = SqliteKeyValueStore::open_in_memory().unwrap();
        let result = tokio_test::block_on(store.remove("nope"));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("vipmon.db");

        {
            let store = SqliteKeyValueStore::open(&path).unwrap();
            store.set("vipmon.error_queue", r#"[{"a":1}]"#).await.unwrap();
        }

        let reopened = SqliteKeyValueStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("vipmon.error_queue").await.unwrap().as_deref(),
            Some(r#"[{"a":1}]"#)
        );
    }

    #[test]
    fn open_invalid_path_fails() {
        let result = SqliteKeyValueStore::open(Path::new("/nonexistent-dir/sub/vipmon.db"));
        assert!(matches!(result, Err(CoreError::Storage(_))));
    }
}
