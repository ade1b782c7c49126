//! 扫码失败分类
//!
//! 每种失败对应一个稳定的错误码和一条状态栏文案。所有失败对本次尝试都是终态，
//! 恢复只能通过显式的 `retry()`。

use thiserror::Error;
use token::Rejection;

/// 载荷无法解析时的文案
pub(crate) const MSG_INVALID_FORMAT: &str = "INVALID DATA FORMAT";

/// 扫码失败原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// 载荷无法解析或结构无效
    #[error("{message}")]
    Invalid { message: String },

    /// 令牌超过最大年龄
    #[error("QR EXPIRED - REFRESH REQUIRED")]
    Expired { age_ms: i64, max_age_ms: i64 },

    /// 本会话已签到
    #[error("ALREADY CHECKED IN: {session_id}")]
    Duplicate { session_id: String },

    /// 摄像头不可用
    #[error("CAMERA ACCESS DENIED")]
    CameraError { reason: String },

    /// 扫码过程中应用切到后台
    #[error("SECURITY VIOLATION: APP BACKGROUNDED")]
    SecurityViolation,

    /// 签到存储不可达（fail_closed）
    #[error("ATTENDANCE SERVICE UNAVAILABLE")]
    Other { reason: String },
}

impl ScanError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "INVALID",
            Self::Expired { .. } => "EXPIRED",
            Self::Duplicate { .. } => "DUPLICATE",
            Self::CameraError { .. } => "CAMERA_ERROR",
            Self::SecurityViolation => "SECURITY_VIOLATION",
            Self::Other { .. } => "OTHER_ERROR",
        }
    }

    pub(crate) fn invalid_format() -> Self {
        Self::Invalid {
            message: MSG_INVALID_FORMAT.to_string(),
        }
    }
}

impl From<Rejection> for ScanError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Invalid => Self::Invalid {
                message: rejection.to_string(),
            },
            Rejection::Expired { age_ms, max_age_ms } => Self::Expired { age_ms, max_age_ms },
        }
    }
}

impl From<recorder::StoreError> for ScanError {
    fn from(err: recorder::StoreError) -> Self {
        match err {
            recorder::StoreError::Duplicate { session_id, .. } => Self::Duplicate { session_id },
            recorder::StoreError::Unavailable(reason) => Self::Other { reason },
        }
    }
}

impl From<ScanError> for sentinel_common::BaseError {
    fn from(err: ScanError) -> Self {
        sentinel_common::BaseError::scanner(format!("{}: {}", err.code(), err))
    }
}
