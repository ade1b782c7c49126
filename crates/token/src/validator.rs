//! 令牌校验器
//!
//! 纯函数式判定：给定 `(token, now)` 结果确定，无副作用。
//!
//! 1. 结构检查：`session_id` 与 `nonce` 非空，否则 [`Rejection::Invalid`]
//! 2. 新鲜度检查：`now - issued_at > max_token_age` 则 [`Rejection::Expired`]
//! 3. 通过后交由签到记录做有状态的去重，校验通过并不代表最终签到成功
//!
//! `now` 在校验时读取而非扫码时，处理延迟会计入年龄，因此最大年龄需要
//! 明显大于轮换间隔。签发时间在未来的令牌不做时钟偏差补偿，直接放行。

use crate::token::Token;
use sentinel_common::ProtocolConfig;
use thiserror::Error;
use tracing::debug;

/// 校验拒绝原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// 载荷结构无效
    #[error("MALFORMED PAYLOAD DETECTED")]
    Invalid,

    /// 令牌已过期
    #[error("QR EXPIRED - REFRESH REQUIRED")]
    Expired { age_ms: i64, max_age_ms: i64 },
}

/// 令牌校验器
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_token_age_ms: i64,
}

impl Validator {
    pub fn new(max_token_age_ms: u64) -> Self {
        Self {
            max_token_age_ms: i64::try_from(max_token_age_ms).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.max_token_age_ms())
    }

    pub fn max_token_age_ms(&self) -> i64 {
        self.max_token_age_ms
    }

    /// 校验令牌
    pub fn validate(&self, token: &Token, now: i64) -> Result<(), Rejection> {
        if token.session_id.trim().is_empty() || token.nonce.trim().is_empty() {
            debug!("Token rejected: missing session id or nonce");
            return Err(Rejection::Invalid);
        }

        let age_ms = token.age_ms(now);
        debug!(
            "QR age: {}ms (limit: {}ms), session={}",
            age_ms, self.max_token_age_ms, token.session_id
        );

        if age_ms > self.max_token_age_ms {
            return Err(Rejection::Expired {
                age_ms,
                max_age_ms: self.max_token_age_ms,
            });
        }

        Ok(())
    }
}
