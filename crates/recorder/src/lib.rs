//! 签到记录
//!
//! 校验通过的令牌在这里完成最终判定：同一提交者在同一会话中只能签到一次。
//!
//! - [`AttendanceStore`]：存储能力，插入时原子地保证 `(session_id, submitter_id)` 唯一
//! - [`SqliteAttendanceStore`]：sqlx 连接池 + WAL，唯一约束由数据库保证
//! - [`MemoryAttendanceStore`]：进程内实现，用于演示与测试
//! - [`AttendanceRecorder`]：在存储之上应用 [`FailurePolicy`](sentinel_common::FailurePolicy)

pub mod error;
pub mod memory;
pub mod recorder;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryAttendanceStore;
pub use recorder::{AttendanceRecorder, RecordOutcome};
pub use sqlite::SqliteAttendanceStore;
pub use store::{AttendanceRecord, AttendanceStore};
