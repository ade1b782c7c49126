//! 内存签到存储
//!
//! 进程退出即丢失，用于演示模式与测试。

use crate::error::StoreError;
use crate::store::{AttendanceRecord, AttendanceStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::Mutex;

/// 去重键：(session_id, submitter_id)
type AttendanceKey = (String, String);

#[derive(Debug, Default)]
pub struct MemoryAttendanceStore {
    records: Mutex<HashMap<AttendanceKey, AttendanceRecord>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前全部记录数（跨会话）
    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let key = (
            record.session_id.clone(),
            record.submitter_id.as_str().to_string(),
        );

        match self.records.lock().await.entry(key) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                session_id: record.session_id.clone(),
                submitter_id: record.submitter_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn count(&self, session_id: &str) -> Result<u64, StoreError> {
        let records = self.records.lock().await;
        Ok(records.keys().filter(|(s, _)| s == session_id).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_common::SubmitterId;

    fn record(session: &str, submitter: &str) -> AttendanceRecord {
        AttendanceRecord {
            session_id: session.to_string(),
            nonce: "n".to_string(),
            submitter_id: SubmitterId::new(submitter).unwrap(),
            recorded_at: 0,
        }
    }

    #[tokio::test]
    async fn test_dedup_per_session() {
        let store = MemoryAttendanceStore::new();
        assert!(store.is_empty().await);

        store.insert(&record("CS-404", "S1")).await.unwrap();
        assert!(store.insert(&record("CS-404", "S1")).await.unwrap_err().is_duplicate());
        store.insert(&record("CS-404", "S2")).await.unwrap();
        store.insert(&record("ETH-101", "S1")).await.unwrap();

        assert_eq!(store.count("CS-404").await.unwrap(), 2);
        assert_eq!(store.count("ETH-101").await.unwrap(), 1);
        assert_eq!(store.count("SYS-500").await.unwrap(), 0);
        assert_eq!(store.len().await, 3);
        assert!(store.health_check().await.is_ok());
    }
}
