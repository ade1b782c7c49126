//! Sentinel 基础设施库
//!
//! 为考勤协议各组件提供共享的基础设施：配置加载与校验、统一错误类型、
//! 可注入的时钟抽象以及身份类型。

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::{
    FailurePolicy, ProtocolConfig, ProtocolProfile, RecorderBackend, RecorderConfig,
    SentinelConfig,
};
pub use error::{BaseError, ConfigError, Result, ValidationError};
pub use types::SubmitterId;
