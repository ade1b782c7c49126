//! 签发器错误类型

use thiserror::Error;

/// 令牌签发错误
#[derive(Error, Debug)]
pub enum IssuerError {
    /// 会话 ID 为空
    #[error("Cannot start rotation: session id is empty")]
    EmptySession,

    /// 当前线程不在 tokio 运行时中
    #[error("Token rotation requires a running tokio runtime")]
    NoRuntime,

    /// 轮换间隔或倒计时粒度为 0
    #[error("Rotation interval and countdown tick must be greater than zero")]
    InvalidInterval,

    /// 令牌编码失败
    #[error("Token encoding failed: {0}")]
    Token(#[from] token::TokenError),
}

/// 二维码渲染错误
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot render an empty payload")]
    EmptyPayload,

    #[error("Payload of {len} bytes exceeds renderer capacity of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },
}

impl From<IssuerError> for sentinel_common::BaseError {
    fn from(err: IssuerError) -> Self {
        sentinel_common::BaseError::issuer(err.to_string())
    }
}
