//! Token 数据结构
//!
//! 二维码中承载的明文令牌。字段名在线上格式中保持 `classId` / `timestamp` /
//! `nonce`，与已打印或正在展示的旧版二维码兼容。

use crate::error::{Result, TokenError};
use crate::nonce;
use serde::{Deserialize, Serialize};
use sentinel_common::Clock;

/// 考勤令牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// 课程会话 ID，对协议不透明
    #[serde(rename = "classId")]
    pub session_id: String,

    /// 签发时间（Unix 毫秒），只接受整数
    #[serde(rename = "timestamp")]
    pub issued_at: i64,

    /// 每次签发唯一的随机标记（非密码学安全）
    pub nonce: String,
}

impl Token {
    pub fn new(session_id: impl Into<String>, issued_at: i64, nonce: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            issued_at,
            nonce: nonce.into(),
        }
    }

    /// 以当前时间和新 nonce 签发令牌
    pub fn issue(session_id: impl Into<String>, clock: &dyn Clock) -> Self {
        Self::new(session_id, clock.now_millis(), nonce::generate())
    }

    /// 令牌在 `now` 时刻的年龄（毫秒），签发时间在未来时为负
    pub fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.issued_at)
    }

    /// 展示在二维码下方的会话哈希
    pub fn session_hash(&self) -> String {
        self.nonce.to_uppercase()
    }

    /// 编码为二维码载荷（紧凑 JSON）
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self).map_err(TokenError::Encode)
    }

    /// 从扫码得到的原始字符串解析令牌
    ///
    /// 三个字段缺一不可；未知字段忽略。空字符串字段在此处可以通过，
    /// 由 [`crate::Validator`] 判定为结构无效。
    pub fn from_payload(raw: &str) -> Result<Self> {
        serde_json::from_str(raw.trim()).map_err(|e| TokenError::malformed(e.to_string()))
    }
}
