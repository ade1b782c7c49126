//! SQLite 签到存储
//!
//! # 数据模型
//!
//! ```sql
//! CREATE TABLE attendance (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     session_id TEXT NOT NULL,
//!     nonce TEXT NOT NULL,                 -- 被接受的令牌，仅审计
//!     submitter_id TEXT NOT NULL,
//!     recorded_at INTEGER NOT NULL,        -- Unix 毫秒
//!     UNIQUE(session_id, submitter_id)     -- 去重键
//! )
//! ```
//!
//! 去重完全依赖唯一约束，插入即判定，不存在“先查后写”的竞争窗口。
//!
//! # 线程安全
//!
//! 使用 sqlx 连接池实现原生异步并发访问，启用 WAL 模式提升读性能。
//!
//! # 示例
//!
//! ```no_run
//! use recorder::{AttendanceRecord, AttendanceStore, SqliteAttendanceStore};
//! use sentinel_common::SubmitterId;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = SqliteAttendanceStore::new("attendance.db").await?;
//! let record = AttendanceRecord {
//!     session_id: "CS-404".to_string(),
//!     nonce: "k3j5h2g9a0".to_string(),
//!     submitter_id: SubmitterId::new("S1")?,
//!     recorded_at: 1_700_000_000_000,
//! };
//! store.insert(&record).await?;
//! assert_eq!(store.count("CS-404").await?, 1);
//! # Ok(())
//! # }
//! ```

use crate::error::StoreError;
use crate::store::{AttendanceRecord, AttendanceStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// 连接池最大连接数
const MAX_CONNECTIONS: u32 = 10;

/// 签到存储（使用 sqlx 连接池）
#[derive(Clone)]
pub struct SqliteAttendanceStore {
    pool: SqlitePool,
}

impl SqliteAttendanceStore {
    /// 创建或打开签到数据库
    ///
    /// - WAL 模式，同步模式 NORMAL
    /// - busy_timeout 5 秒，并发写入时排队而不是立即失败
    pub async fn new<P: AsRef<Path>>(db_file: P) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}", db_file.as_ref().display()))
                .context("Failed to parse SQLite URL")?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                nonce TEXT NOT NULL,
                submitter_id TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,
                UNIQUE(session_id, submitter_id)
            )",
        )
        .execute(&pool)
        .await
        .context("Failed to create attendance table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_attendance_session ON attendance(session_id)")
            .execute(&pool)
            .await
            .context("Failed to create attendance index")?;

        info!(
            "Attendance store initialized: path={}, max_connections={}, WAL mode enabled",
            db_file.as_ref().display(),
            MAX_CONNECTIONS
        );
        Ok(Self { pool })
    }

    /// 按记录时间列出会话的签到
    #[cfg(test)]
    pub(crate) async fn records(&self, session_id: &str) -> Result<Vec<(String, String, i64)>> {
        let rows = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT submitter_id, nonce, recorded_at FROM attendance
             WHERE session_id = ?1 ORDER BY recorded_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list attendance")?;
        Ok(rows)
    }

    /// 关闭连接池，之后的所有操作返回 [`StoreError::Unavailable`]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AttendanceStore for SqliteAttendanceStore {
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO attendance (session_id, nonce, submitter_id, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.session_id)
        .bind(&record.nonce)
        .bind(record.submitter_id.as_str())
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    "Inserted attendance: session={}, submitter={}",
                    record.session_id, record.submitter_id
                );
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") => {
                Err(StoreError::Duplicate {
                    session_id: record.session_id.clone(),
                    submitter_id: record.submitter_id.to_string(),
                })
            }
            Err(e) => Err(StoreError::unavailable(e)),
        }
    }

    async fn count(&self, session_id: &str) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// 执行简单的数据库查询验证连接池
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_common::SubmitterId;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(session: &str, submitter: &str, nonce: &str) -> AttendanceRecord {
        AttendanceRecord {
            session_id: session.to_string(),
            nonce: nonce.to_string(),
            submitter_id: SubmitterId::new(submitter).unwrap(),
            recorded_at: 1_000,
        }
    }

    async fn open(dir: &TempDir) -> SqliteAttendanceStore {
        SqliteAttendanceStore::new(dir.path().join("attendance.db"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_count() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        assert_eq!(store.count("CS-404").await.unwrap(), 0);
        store.insert(&record("CS-404", "S1", "n1")).await.unwrap();
        store.insert(&record("CS-404", "S2", "n1")).await.unwrap();
        store.insert(&record("ETH-101", "S1", "n9")).await.unwrap();

        assert_eq!(store.count("CS-404").await.unwrap(), 2);
        assert_eq!(store.count("ETH-101").await.unwrap(), 1);
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_submitter_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        store.insert(&record("CS-404", "S1", "n1")).await.unwrap();
        // 即使换了一个新令牌，同一会话同一提交者也只记一次
        let err = store.insert(&record("CS-404", "S1", "n2")).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Duplicate {
                session_id: "CS-404".to_string(),
                submitter_id: "S1".to_string(),
            }
        );

        let rows = store.records("CS-404").await.unwrap();
        assert_eq!(rows, vec![("S1".to_string(), "n1".to_string(), 1_000)]);
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_exactly_one_wins() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open(&dir).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(&record("CS-404", "S1", &format!("n{i}"))).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert!(e.is_duplicate(), "unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.count("CS-404").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir).await;
            store.insert(&record("CS-404", "S1", "n1")).await.unwrap();
            store.close().await;
        }

        let store = open(&dir).await;
        assert_eq!(store.count("CS-404").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        store.close().await;

        let err = store.insert(&record("CS-404", "S1", "n1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.health_check().await.is_err());
    }
}
