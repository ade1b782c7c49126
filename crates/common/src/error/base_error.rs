//! 顶层错误枚举
//!
//! 聚合基础设施层的错误类型，各业务 crate 的错误通过 `From` 转换汇入

use super::{ConfigError, ValidationError};
use thiserror::Error;

/// 顶层错误枚举
#[derive(Error, Debug)]
pub enum BaseError {
    // ========== 组件错误 ==========
    /// 令牌签发错误
    #[error("Issuer error: {message}")]
    Issuer { message: String },

    /// 签到记录错误
    #[error("Recorder error: {message}")]
    Recorder { message: String },

    /// 扫码会话错误
    #[error("Scanner error: {message}")]
    Scanner { message: String },

    // ========== 基础设施错误 ==========
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 验证错误
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // ========== 通用错误 ==========
    /// 通用错误（用于不适合其他类别的错误）
    #[error("General error: {message}")]
    General { message: String },
}

impl BaseError {
    /// 创建通用错误
    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// 创建签发器错误
    pub fn issuer(message: impl Into<String>) -> Self {
        Self::Issuer {
            message: message.into(),
        }
    }

    /// 创建签到记录错误
    pub fn recorder(message: impl Into<String>) -> Self {
        Self::Recorder {
            message: message.into(),
        }
    }

    /// 创建扫码会话错误
    pub fn scanner(message: impl Into<String>) -> Self {
        Self::Scanner {
            message: message.into(),
        }
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, BaseError>;
