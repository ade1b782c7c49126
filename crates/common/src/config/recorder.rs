//! 签到记录存储配置

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 存储后端类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderBackend {
    /// SQLite 数据库
    #[default]
    Sqlite,
    /// 进程内存（重启即丢失，仅用于演示与测试）
    Memory,
}

/// 存储不可达时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 存储不可达即拒绝签到
    #[default]
    FailClosed,
    /// 存储不可达时仍视为签到成功（离线时可能重复计数）
    FailOpen,
}

/// 签到记录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub backend: RecorderBackend,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// SQLite 数据库文件路径（backend = "sqlite" 时使用）
    #[serde(
        default = "default_sqlite_path",
        serialize_with = "super::serialize_pathbuf",
        deserialize_with = "super::deserialize_pathbuf"
    )]
    pub sqlite_path: PathBuf,
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("database/attendance.db")
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            backend: RecorderBackend::default(),
            failure_policy: FailurePolicy::default(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

impl RecorderConfig {
    /// 内存后端配置
    pub fn memory() -> Self {
        Self {
            backend: RecorderBackend::Memory,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.backend == RecorderBackend::Sqlite
            && self
                .sqlite_path
                .to_str()
                .map(|s| s.trim().is_empty())
                .unwrap_or(true)
        {
            errors.push("recorder.sqlite_path cannot be empty when backend = \"sqlite\"".to_string());
        }

        if self.failure_policy == FailurePolicy::FailOpen {
            errors.push(
                "Warning: recorder.failure_policy = \"fail_open\" accepts attendance while the store is unreachable"
                    .to_string(),
            );
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: RecorderConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend, RecorderBackend::Sqlite);
        assert_eq!(config.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(config.sqlite_path, PathBuf::from("database/attendance.db"));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_fail_open_is_a_warning() {
        let config: RecorderConfig = toml::from_str(
            r#"
            backend = "memory"
            failure_policy = "fail_open"
        "#,
        )
        .unwrap();
        assert_eq!(config.backend, RecorderBackend::Memory);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Warning:"));
    }
}
