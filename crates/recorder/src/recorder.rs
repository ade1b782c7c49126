//! 签到记录器
//!
//! 在存储之上应用失败策略：
//!
//! | 存储结果 | fail_closed | fail_open |
//! |----------|-------------|-----------|
//! | 写入成功 | `Recorded` | `Recorded` |
//! | 重复签到 | `Err(Duplicate)` | `Err(Duplicate)` |
//! | 不可达   | `Err(Unavailable)` | `AcceptedUnconfirmed` + warn |

use crate::error::StoreError;
use crate::memory::MemoryAttendanceStore;
use crate::sqlite::SqliteAttendanceStore;
use crate::store::{AttendanceRecord, AttendanceStore};
use anyhow::{Context, Result};
use sentinel_common::{FailurePolicy, RecorderBackend, RecorderConfig, SubmitterId};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 一次成功签到的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// 已持久化
    Recorded,
    /// 存储不可达，按 fail_open 策略放行，未落盘
    AcceptedUnconfirmed,
}

pub struct AttendanceRecorder {
    store: Arc<dyn AttendanceStore>,
    policy: FailurePolicy,
}

impl AttendanceRecorder {
    pub fn new(store: Arc<dyn AttendanceStore>, policy: FailurePolicy) -> Self {
        Self { store, policy }
    }

    /// 按配置创建存储后端
    pub async fn from_config(config: &RecorderConfig) -> Result<Self> {
        let store: Arc<dyn AttendanceStore> = match config.backend {
            RecorderBackend::Sqlite => {
                if let Some(parent) = config.sqlite_path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    tokio::fs::create_dir_all(parent).await.with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
                let store = SqliteAttendanceStore::new(&config.sqlite_path)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to open attendance database {}",
                            config.sqlite_path.display()
                        )
                    })?;
                Arc::new(store)
            }
            RecorderBackend::Memory => Arc::new(MemoryAttendanceStore::new()),
        };

        info!(
            "Attendance recorder ready: backend={:?}, failure_policy={:?}",
            config.backend, config.failure_policy
        );
        Ok(Self::new(store, config.failure_policy))
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// 记录一次签到
    ///
    /// `Duplicate` 不受失败策略影响。
    pub async fn record(
        &self,
        session_id: &str,
        nonce: &str,
        submitter_id: &SubmitterId,
        recorded_at: i64,
    ) -> Result<RecordOutcome, StoreError> {
        let record = AttendanceRecord {
            session_id: session_id.to_string(),
            nonce: nonce.to_string(),
            submitter_id: submitter_id.clone(),
            recorded_at,
        };

        match self.store.insert(&record).await {
            Ok(()) => {
                info!(
                    "Attendance recorded: session={}, submitter={}",
                    session_id, submitter_id
                );
                Ok(RecordOutcome::Recorded)
            }
            Err(e @ StoreError::Duplicate { .. }) => {
                warn!(
                    "Duplicate attendance rejected: session={}, submitter={}",
                    session_id, submitter_id
                );
                Err(e)
            }
            Err(e @ StoreError::Unavailable(_)) => match self.policy {
                FailurePolicy::FailOpen => {
                    warn!(
                        "Attendance store unavailable, accepting without confirmation: session={}, submitter={}, error={}",
                        session_id, submitter_id, e
                    );
                    Ok(RecordOutcome::AcceptedUnconfirmed)
                }
                FailurePolicy::FailClosed => {
                    error!(
                        "Attendance store unavailable: session={}, submitter={}, error={}",
                        session_id, submitter_id, e
                    );
                    Err(e)
                }
            },
        }
    }

    /// 会话签到人数
    pub async fn count(&self, session_id: &str) -> Result<u64, StoreError> {
        self.store.count(session_id).await
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.store.health_check().await
    }
}
