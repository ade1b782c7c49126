//! 令牌错误类型

use thiserror::Error;

/// 令牌编解码错误
#[derive(Error, Debug)]
pub enum TokenError {
    /// 扫码内容无法解析为令牌
    #[error("Malformed token payload: {reason}")]
    Malformed { reason: String },

    /// 令牌序列化失败
    #[error("Failed to encode token payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// 令牌模块专用的 Result 类型
pub type Result<T> = std::result::Result<T, TokenError>;

impl TokenError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

impl From<TokenError> for sentinel_common::BaseError {
    fn from(err: TokenError) -> Self {
        sentinel_common::BaseError::general(err.to_string())
    }
}
