//! 签到记录错误类型

use thiserror::Error;

/// 存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 同一提交者已在该会话签到
    #[error("Attendance already recorded: session={session_id}, submitter={submitter_id}")]
    Duplicate {
        session_id: String,
        submitter_id: String,
    },

    /// 存储不可达或执行失败
    #[error("Attendance store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(reason: impl ToString) -> Self {
        Self::Unavailable(reason.to_string())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl From<StoreError> for sentinel_common::BaseError {
    fn from(err: StoreError) -> Self {
        sentinel_common::BaseError::recorder(err.to_string())
    }
}
