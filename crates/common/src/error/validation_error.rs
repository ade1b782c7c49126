//! 验证相关错误类型
//!
//! 定义所有与输入数据验证相关的错误

use thiserror::Error;

/// 验证相关错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Value out of range: {field} = {value}")]
    OutOfRange { field: String, value: String },

    #[error("Invalid format: {field}")]
    InvalidFormat { field: String },
}
