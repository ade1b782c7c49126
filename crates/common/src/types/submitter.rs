use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 签到提交者身份（学生 ID）
///
/// 由调用方在构造扫码会话时显式注入，协议逻辑不读取任何全局存储。
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubmitterId(String);

impl SubmitterId {
    /// 创建身份，去除首尾空白且不能为空
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "submitter_id".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubmitterId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubmitterId> for String {
    fn from(id: SubmitterId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitter_id_is_trimmed() {
        let id = SubmitterId::new("  S1 ").unwrap();
        assert_eq!(id.as_str(), "S1");
        assert_eq!(id.to_string(), "S1");
    }

    #[test]
    fn test_empty_submitter_id_rejected() {
        assert!(matches!(
            SubmitterId::new("   "),
            Err(ValidationError::Required { .. })
        ));
    }
}
