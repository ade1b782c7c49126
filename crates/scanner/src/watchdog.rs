//! 安全看门狗
//!
//! 扫码或校验过程中应用切到后台，视为可能在转发二维码，本次尝试直接判定失败。
//!
//! - [`VisibilitySignal`]：可见性来源能力，宿主环境（窗口系统、移动端生命周期）实现
//! - [`ViolationDetector`]：纯判定逻辑，只在 `Visible → Hidden` 的跳变且处于守护状态时触发
//! - [`SecurityWatchdog`]：监听任务，由 [`WatchdogGuard`] 持有，guard 释放即退订
//!
//! watch 通道只保留最新值，监听任务来不及观察的短暂隐藏会被合并掉。

use crate::state::AccessState;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// 应用可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// 可见性来源
pub trait VisibilitySignal: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<Visibility>;
}

/// 进程内可见性广播
#[derive(Debug)]
pub struct VisibilityBus {
    tx: watch::Sender<Visibility>,
}

impl Default for VisibilityBus {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityBus {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Visibility::Visible);
        Self { tx }
    }

    pub fn set(&self, visibility: Visibility) {
        self.tx.send_if_modified(|current| {
            if *current == visibility {
                return false;
            }
            *current = visibility;
            true
        });
    }

    pub fn hide(&self) {
        self.set(Visibility::Hidden);
    }

    pub fn show(&self) {
        self.set(Visibility::Visible);
    }

    pub fn current(&self) -> Visibility {
        *self.tx.borrow()
    }
}

impl VisibilitySignal for VisibilityBus {
    fn subscribe(&self) -> watch::Receiver<Visibility> {
        self.tx.subscribe()
    }
}

/// 违规判定
#[derive(Debug, Clone)]
pub struct ViolationDetector {
    last: Visibility,
}

impl ViolationDetector {
    pub fn new(initial: Visibility) -> Self {
        Self { last: initial }
    }

    /// 记录新的可见性，返回是否构成违规
    pub fn observe(&mut self, visibility: Visibility, state: AccessState) -> bool {
        let became_hidden = self.last == Visibility::Visible && visibility == Visibility::Hidden;
        self.last = visibility;
        became_hidden && state.is_guarded()
    }
}

/// 看门狗监听任务句柄，释放即停止监听
pub struct WatchdogGuard {
    _cancel: DropGuard,
}

pub struct SecurityWatchdog;

impl SecurityWatchdog {
    /// 启动监听任务
    ///
    /// `state_fn` 在每次可见性变化时读取当前状态；判定违规后调用 `on_violation`。
    /// 必须在 tokio 运行时中调用。
    pub fn watch<V, S, F>(signal: &V, state_fn: S, on_violation: F) -> WatchdogGuard
    where
        V: VisibilitySignal + ?Sized,
        S: Fn() -> AccessState + Send + 'static,
        F: Fn() + Send + 'static,
    {
        let mut rx = signal.subscribe();
        let mut detector = ViolationDetector::new(*rx.borrow_and_update());
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => break,

                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let visibility = *rx.borrow_and_update();
                        let state = state_fn();
                        if detector.observe(visibility, state) {
                            warn!("Backgrounding detected during {}, terminating scan session", state);
                            on_violation();
                        }
                    }
                }
            }
            debug!("Security watchdog stopped");
        });

        WatchdogGuard {
            _cancel: cancel.drop_guard(),
        }
    }
}
