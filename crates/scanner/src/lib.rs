//! 学生端扫码会话
//!
//! # 状态机
//!
//! ```text
//!            unlock             on_decode
//! Locked ───────────▶ Scanning ───────────▶ Validating ──┬──▶ Granted
//!   ▲                    ▲                               │
//!   │ cancel (任意状态)   │ retry                          └──▶ Denied
//!   └────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! - 一次扫码最多提交一个载荷：进入 `Validating` 是原子的比较并交换
//! - `Granted` / `Denied` 为终态，只能通过 `retry()` 或 `cancel()` 离开
//! - `cancel()` 或安全违规后到达的校验结果被丢弃，不会覆盖当前状态
//!
//! # 组件
//!
//! - [`ScanSession`]：状态机与提交流程
//! - [`capture`]：帧来源 / 解码能力与采集循环
//! - [`watchdog`]：应用切到后台时终止扫码

pub mod capture;
pub mod error;
pub mod session;
pub mod state;
pub mod watchdog;

pub use capture::{
    CameraError, ChannelFrameSource, FrameDecoder, FrameSource, LineFrameSource, PayloadDecoder,
};
pub use error::ScanError;
pub use session::{Receipt, ScanOutcome, ScanSession};
pub use state::{AccessState, ScanStatus};
pub use watchdog::{
    SecurityWatchdog, ViolationDetector, Visibility, VisibilityBus, VisibilitySignal,
    WatchdogGuard,
};
