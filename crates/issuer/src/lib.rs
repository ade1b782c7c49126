//! 讲师端令牌签发
//!
//! # 功能概述
//!
//! - 启动后立即签发首个令牌，此后每个轮换间隔签发一次
//! - 以 100ms 粒度维护距下次轮换的倒计时，仅供界面展示
//! - 通过 watch 通道向展示层推送当前令牌及其二维码载荷
//!
//! # 架构设计
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  TokenIssuer                                 │
//! │  ┌──────────────┐     ┌───────────────────┐  │
//! │  │ start/stop   │────▶│ rotation task     │  │
//! │  └──────────────┘     │  ├ rotation tick  │  │
//! │                       │  └ countdown tick │  │
//! │                       └─────────┬─────────┘  │
//! └─────────────────────────────────┼────────────┘
//!                                   │ watch<Option<Issuance>>
//!                                   ▼
//!                            ┌─────────────┐
//!                            │ CodeRenderer│ (二维码/文本)
//!                            └─────────────┘
//! ```
//!
//! 轮换与倒计时在同一个任务中由 `select!` 驱动，停止时一并取消，
//! 视图销毁后不会残留后台定时器。

pub mod error;
pub mod issuer;
pub mod render;

pub use error::{IssuerError, RenderError};
pub use issuer::{Issuance, IssuerConfig, TokenIssuer};
pub use render::{CodeRenderer, TextRenderer, render_issuance};
