//! # sentinel
//!
//! 轮换二维码考勤协议：讲师端按固定间隔签发短时令牌，学生端扫码后校验新鲜度、
//! 去重记录签到。本 crate 汇总各组件的公共接口，便于嵌入到其他宿主程序。

pub use issuer::{CodeRenderer, Issuance, IssuerConfig, TextRenderer, TokenIssuer};
pub use recorder::{
    AttendanceRecorder, AttendanceStore, MemoryAttendanceStore, RecordOutcome,
    SqliteAttendanceStore, StoreError,
};
pub use scanner::{
    AccessState, FrameDecoder, FrameSource, Receipt, ScanError, ScanOutcome, ScanSession,
    ScanStatus, Visibility, VisibilityBus, VisibilitySignal,
};
pub use sentinel_common::{Clock, SentinelConfig, SubmitterId, SystemClock};
pub use token::{Rejection, Token, Validator};
