//! 统一错误处理模型
//!
//! 提供主程序 sentinel 的顶层错误类型，聚合各组件 crate 的错误

use thiserror::Error;

/// 主程序的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 配置相关错误 ==========
    /// 配置文件相关错误
    #[error("Configuration error: {0}")]
    Config(#[from] sentinel_common::ConfigError),

    // ========== 基础库错误 ==========
    /// Base crate 聚合错误
    #[error("Base library error: {0}")]
    Base(Box<sentinel_common::BaseError>),

    // ========== 组件错误 ==========
    /// 令牌签发错误
    #[error("Issuer error: {0}")]
    Issuer(#[from] issuer::IssuerError),

    /// 签到存储错误
    #[error("Attendance store error: {0}")]
    Store(#[from] recorder::StoreError),

    /// 扫码失败
    #[error("Scan denied [{code}]: {0}", code = .0.code())]
    Scan(#[from] scanner::ScanError),

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ========== 业务逻辑错误 ==========
    /// 配置验证失败
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // ========== 通用错误 ==========
    /// Anyhow 错误兼容层（存储初始化等）
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),

    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

impl From<sentinel_common::BaseError> for Error {
    fn from(err: sentinel_common::BaseError) -> Self {
        Error::Base(Box::new(err))
    }
}

impl From<sentinel_common::ValidationError> for Error {
    fn from(err: sentinel_common::ValidationError) -> Self {
        sentinel_common::BaseError::from(err).into()
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建配置验证失败错误
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}
