//! 令牌轮换协议配置
//!
//! 轮换间隔决定讲师端多久签发一次新令牌，最大令牌年龄决定学生端可接受的
//! 令牌新鲜度。后者必须大于前者，以容忍“签发 → 显示 → 扫码 → 校验”之间的延迟。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认倒计时刷新粒度（毫秒）
const DEFAULT_COUNTDOWN_TICK_MS: u64 = 100;

/// 部署预设
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolProfile {
    /// 演示模式：5 秒轮换，7 秒有效
    #[default]
    Demo,
    /// 课堂模式：60 秒轮换，65 秒有效
    Lecture,
}

impl ProtocolProfile {
    pub fn rotation_interval_ms(self) -> u64 {
        match self {
            Self::Demo => 5_000,
            Self::Lecture => 60_000,
        }
    }

    pub fn max_token_age_ms(self) -> u64 {
        match self {
            Self::Demo => 7_000,
            Self::Lecture => 65_000,
        }
    }
}

/// 协议参数
///
/// 未显式设置的时间参数取自 `profile` 预设。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub profile: ProtocolProfile,

    /// 令牌轮换间隔（毫秒），覆盖预设
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_interval_ms: Option<u64>,

    /// 令牌最大年龄（毫秒），覆盖预设
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_token_age_ms: Option<u64>,

    /// 倒计时刷新粒度（毫秒）
    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,
}

fn default_countdown_tick_ms() -> u64 {
    DEFAULT_COUNTDOWN_TICK_MS
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::from_profile(ProtocolProfile::default())
    }
}

impl ProtocolConfig {
    pub fn from_profile(profile: ProtocolProfile) -> Self {
        Self {
            profile,
            rotation_interval_ms: None,
            max_token_age_ms: None,
            countdown_tick_ms: DEFAULT_COUNTDOWN_TICK_MS,
        }
    }

    pub fn rotation_interval_ms(&self) -> u64 {
        self.rotation_interval_ms
            .unwrap_or_else(|| self.profile.rotation_interval_ms())
    }

    pub fn max_token_age_ms(&self) -> u64 {
        self.max_token_age_ms
            .unwrap_or_else(|| self.profile.max_token_age_ms())
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_millis(self.rotation_interval_ms())
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    /// 校验协议参数，返回全部问题
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let rotation = self.rotation_interval_ms();
        let max_age = self.max_token_age_ms();

        if rotation == 0 {
            errors.push("protocol.rotation_interval_ms must be greater than 0".to_string());
        }
        if self.countdown_tick_ms == 0 {
            errors.push("protocol.countdown_tick_ms must be greater than 0".to_string());
        } else if rotation > 0 && self.countdown_tick_ms > rotation {
            errors.push(format!(
                "protocol.countdown_tick_ms ({}) must not exceed rotation_interval_ms ({rotation})",
                self.countdown_tick_ms
            ));
        }
        if max_age <= rotation {
            errors.push(format!(
                "protocol.max_token_age_ms ({max_age}) must be greater than rotation_interval_ms ({rotation})"
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let demo = ProtocolConfig::from_profile(ProtocolProfile::Demo);
        assert_eq!(demo.rotation_interval_ms(), 5_000);
        assert_eq!(demo.max_token_age_ms(), 7_000);

        let lecture = ProtocolConfig::from_profile(ProtocolProfile::Lecture);
        assert_eq!(lecture.rotation_interval(), Duration::from_secs(60));
        assert_eq!(lecture.max_token_age_ms(), 65_000);
        assert!(lecture.validate().is_empty());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config: ProtocolConfig = toml::from_str(
            r#"
            profile = "lecture"
            max_token_age_ms = 90000
        "#,
        )
        .unwrap();
        assert_eq!(config.rotation_interval_ms(), 60_000);
        assert_eq!(config.max_token_age_ms(), 90_000);
        assert_eq!(config.countdown_tick_ms, 100);
    }

    #[test]
    fn test_max_age_must_exceed_rotation() {
        let config = ProtocolConfig {
            rotation_interval_ms: Some(5_000),
            max_token_age_ms: Some(5_000),
            ..ProtocolConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("max_token_age_ms"));
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = ProtocolConfig {
            rotation_interval_ms: Some(0),
            countdown_tick_ms: 0,
            ..ProtocolConfig::default()
        };
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("rotation_interval_ms")));
        assert!(errors.iter().any(|e| e.contains("countdown_tick_ms")));
    }
}
