//! 考勤令牌
//!
//! 讲师端按固定间隔签发的 [`Token`] 由会话 ID、签发时间与随机 nonce 组成，
//! 以紧凑 JSON 文本作为二维码载荷传输；学生端解码后交给 [`Validator`]
//! 做结构与新鲜度校验。

pub mod error;
pub mod nonce;
mod token;
pub mod validator;

pub use error::{Result, TokenError};
pub use token::Token;
pub use validator::{Rejection, Validator};
