//! 时钟抽象
//!
//! 协议中所有时间戳均为 Unix 毫秒。签发器与校验器通过 [`Clock`] 读取当前时间，
//! 测试中注入 [`ManualClock`] 或跟随 tokio 虚拟时间的 [`TokioClock`]，
//! 无需真实等待即可覆盖过期边界。

use std::sync::atomic::{AtomicI64, Ordering};
use tokio::time::Instant;

/// 当前时间来源（Unix 毫秒）
pub trait Clock: Send + Sync + 'static {
    /// 返回当前时间（自 Unix epoch 起的毫秒数）
    fn now_millis(&self) -> i64;
}

/// 系统墙钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// 手动推进的时钟，用于确定性测试
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// 设置为指定时间
    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// 向前推进指定毫秒数
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 以 tokio 单调时钟推算的墙钟
///
/// 在 `tokio::time::pause()` 下随虚拟时间前进，使签发时间戳与定时器保持一致。
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin_millis: i64,
    origin: Instant,
}

impl TokioClock {
    /// 以当前 tokio 时刻对应 `origin_millis`
    pub fn starting_at(origin_millis: i64) -> Self {
        Self {
            origin_millis,
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::starting_at(SystemClock.now_millis())
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> i64 {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        self.origin_millis + elapsed.as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);

        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);

        clock.set(42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_virtual_time() {
        let clock = TokioClock::starting_at(0);
        assert_eq!(clock.now_millis(), 0);

        tokio::time::advance(Duration::from_millis(6_999)).await;
        assert_eq!(clock.now_millis(), 6_999);
    }
}
