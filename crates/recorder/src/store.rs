//! 存储能力定义

use crate::error::StoreError;
use async_trait::async_trait;
use sentinel_common::SubmitterId;

/// 一条签到记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub session_id: String,
    /// 被接受的令牌 nonce，仅用于审计
    pub nonce: String,
    pub submitter_id: SubmitterId,
    /// 记录时间（Unix 毫秒）
    pub recorded_at: i64,
}

/// 签到存储
///
/// 实现必须保证 `insert` 对 `(session_id, submitter_id)` 的唯一性判断与写入是原子的，
/// 并发提交同一键时恰好一个成功。
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// 写入记录，键已存在时返回 [`StoreError::Duplicate`]
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError>;

    /// 统计会话的签到人数
    async fn count(&self, session_id: &str) -> Result<u64, StoreError>;

    /// 检查存储是否可用
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
