//! 统一配置管理系统
//!
//! 本模块是 Sentinel 配置的"单一真理之源"。
//! 所有配置项的定义、文档、默认值都在这里统一管理。

pub mod protocol;
pub mod recorder;
pub mod tracing;

pub use protocol::{ProtocolConfig, ProtocolProfile};
pub use recorder::{FailurePolicy, RecorderBackend, RecorderConfig};
pub use crate::config::tracing::TracingConfig;

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Sentinel 主配置
///
/// 配置文件使用 TOML 格式，所有段落都有默认值，空文件即可得到演示配置。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SentinelConfig {
    /// 实例名称，用于日志与追踪中区分部署
    #[serde(default = "default_name")]
    pub name: String,

    /// 运行环境标识
    ///
    /// - "dev": 开发环境
    /// - "prod": 生产环境，启用额外的检查（文件日志、持久化存储）
    /// - "test": 测试环境
    #[serde(default = "default_env")]
    pub env: String,

    /// 令牌轮换协议参数
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// 签到记录存储
    #[serde(default)]
    pub recorder: RecorderConfig,

    /// 可观测性配置（日志 + 追踪）
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 过滤级别（用于日志与追踪）
    ///
    /// 支持 EnvFilter 语法（如 "info,sqlx=warn"）。默认值 "info"。
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,

    /// OpenTelemetry 追踪配置（需要编译时启用 `opentelemetry` feature）
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 日志输出目标："console"（默认）或 "file"
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 当 output = "file" 时按天轮转
    #[serde(default)]
    pub rotate: bool,

    /// 日志文件目录（output = "file" 时有效）
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter_level: default_filter_level(),
            log: LogConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_name() -> String {
    "sentinel-default".to_string()
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

fn serialize_pathbuf<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    path.display().to_string().serialize(serializer)
}

fn deserialize_pathbuf<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(PathBuf::from(s))
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            env: default_env(),
            protocol: ProtocolConfig::default(),
            recorder: RecorderConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl SentinelConfig {
    /// 获取追踪配置
    pub fn tracing_config(&self) -> &TracingConfig {
        &self.observability.tracing
    }

    /// 返回可观测性配置引用
    pub fn observability_config(&self) -> &ObservabilityConfig {
        &self.observability
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            });
        }

        if !path_ref.is_file() {
            return Err(ConfigError::NotAFile {
                path: path_ref.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;
        ::tracing::debug!("Configuration loaded from {}", path_ref.display());
        Ok(config)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// 验证配置有效性
    ///
    /// 以 "Warning:" 开头的条目为非致命提示，其余为错误。
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "Invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }

        // 验证过滤级别（EnvFilter 语法）
        {
            let main_level = self
                .observability
                .filter_level
                .split(',')
                .next()
                .unwrap_or("")
                .trim();
            if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
                errors.push(format!(
                    "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                    self.observability.filter_level
                ));
            }
        }

        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        if let Err(e) = self.observability.tracing.validate() {
            errors.push(format!("Tracing configuration error: {e}"));
        }

        errors.extend(self.protocol.validate());
        errors.extend(self.recorder.validate());

        if self.env == "prod" {
            if self.recorder.backend == RecorderBackend::Memory {
                errors.push(
                    "Production environment must persist attendance (recorder.backend = \"sqlite\")"
                        .to_string(),
                );
            }
            if self.observability.log.output == "console" {
                errors.push("Warning: Production environment should use file logging (observability.log.output = \"file\")".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
