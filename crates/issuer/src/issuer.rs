//! 令牌签发器
//!
//! # 职责
//!
//! - `start(session_id)`：立即签发首个令牌，然后每个轮换间隔签发一次
//! - `stop()`：停止轮换并释放定时器，可重复调用
//! - `remaining_ms()`：距下次轮换的剩余时间，仅用于展示，不影响签发节奏
//!
//! # 轮换任务
//!
//! 轮换定时器与倒计时定时器在同一个后台任务中由 `select!` 驱动，
//! 取消令牌排在最前，停止后不会再有新的令牌发布。
//! 每次签发时倒计时重置为完整间隔；倒计时先于轮换处理，
//! 同一时刻触发时剩余时间不会被多扣一个刻度。
//!
//! # 示例
//!
//! ```no_run
//! use issuer::{IssuerConfig, TokenIssuer};
//! use sentinel_common::SystemClock;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), issuer::IssuerError> {
//! let mut issuer = TokenIssuer::new(IssuerConfig::default(), Arc::new(SystemClock));
//! let mut updates = issuer.subscribe();
//!
//! issuer.start("CS-404")?;
//! while updates.changed().await.is_ok() {
//!     if let Some(issuance) = updates.borrow().as_ref() {
//!         println!("{}", issuance.payload);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::IssuerError;
use sentinel_common::{Clock, ProtocolConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use token::Token;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

// ========== 常量配置 ==========

/// 默认轮换间隔（毫秒）
const DEFAULT_ROTATION_INTERVAL_MS: u64 = 5_000;

/// 默认倒计时刷新粒度（毫秒）
const DEFAULT_COUNTDOWN_TICK_MS: u64 = 100;

/// 签发器配置
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// 令牌轮换间隔
    pub rotation_interval: Duration,
    /// 倒计时刷新粒度
    pub countdown_tick: Duration,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            rotation_interval: Duration::from_millis(DEFAULT_ROTATION_INTERVAL_MS),
            countdown_tick: Duration::from_millis(DEFAULT_COUNTDOWN_TICK_MS),
        }
    }
}

impl IssuerConfig {
    pub fn from_protocol(config: &ProtocolConfig) -> Self {
        Self {
            rotation_interval: config.rotation_interval(),
            countdown_tick: config.countdown_tick(),
        }
    }
}

/// 一次签发的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuance {
    pub token: Token,
    /// 二维码载荷
    pub payload: String,
    /// 本次轮换中的签发序号，首个令牌为 0
    pub sequence: u64,
}

impl Issuance {
    pub fn session_hash(&self) -> String {
        self.token.session_hash()
    }
}

/// 签发器与后台任务共享的状态
struct Shared {
    clock: Arc<dyn Clock>,
    current: watch::Sender<Option<Issuance>>,
    remaining_ms: AtomicU64,
    rotation_ms: u64,
}

impl Shared {
    /// 签发并发布一个新令牌
    ///
    /// 返回 `Ok(false)` 表示轮换已被取消，令牌未发布。
    fn issue(
        &self,
        session_id: &str,
        sequence: u64,
        cancel: &CancellationToken,
    ) -> Result<bool, IssuerError> {
        let token = Token::issue(session_id, self.clock.as_ref());
        let payload = token.to_payload()?;
        let nonce = token.nonce.clone();
        let issued_at = token.issued_at;

        let issuance = Issuance {
            token,
            payload,
            sequence,
        };

        // 在 watch 锁内检查取消状态，与 stop() 的清空操作互斥
        let published = self.current.send_if_modified(|current| {
            if cancel.is_cancelled() {
                return false;
            }
            *current = Some(issuance);
            true
        });

        if published {
            self.remaining_ms.store(self.rotation_ms, Ordering::Relaxed);
            debug!(
                "Issued token: session={}, sequence={}, issued_at={}, nonce={}",
                session_id, sequence, issued_at, nonce
            );
        }

        Ok(published)
    }
}

/// 正在运行的轮换任务句柄
struct RotationHandle {
    session_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// 讲师端令牌签发器
pub struct TokenIssuer {
    config: IssuerConfig,
    shared: Arc<Shared>,
    rotation: Option<RotationHandle>,
}

impl TokenIssuer {
    pub fn new(config: IssuerConfig, clock: Arc<dyn Clock>) -> Self {
        let (current, _) = watch::channel(None);
        let rotation_ms = u64::try_from(config.rotation_interval.as_millis()).unwrap_or(u64::MAX);

        Self {
            config,
            shared: Arc::new(Shared {
                clock,
                current,
                remaining_ms: AtomicU64::new(0),
                rotation_ms,
            }),
            rotation: None,
        }
    }

    /// 开始为指定会话轮换令牌
    ///
    /// 已在运行时先停止旧的轮换。必须在 tokio 运行时中调用。
    pub fn start(&mut self, session_id: impl Into<String>) -> Result<(), IssuerError> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(IssuerError::EmptySession);
        }
        if self.config.rotation_interval.is_zero() || self.config.countdown_tick.is_zero() {
            return Err(IssuerError::InvalidInterval);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| IssuerError::NoRuntime)?;

        self.stop();

        let cancel = CancellationToken::new();
        let started_at = Instant::now();
        self.shared.issue(&session_id, 0, &cancel)?;

        let task = runtime.spawn(run_rotation(
            self.shared.clone(),
            session_id.clone(),
            cancel.clone(),
            started_at,
            self.config.clone(),
        ));

        info!(
            "Token rotation started: session={}, interval={:?}",
            session_id, self.config.rotation_interval
        );

        self.rotation = Some(RotationHandle {
            session_id,
            cancel,
            task,
        });
        Ok(())
    }

    /// 停止轮换，可重复调用
    pub fn stop(&mut self) {
        let Some(handle) = self.rotation.take() else {
            return;
        };

        handle.cancel.cancel();
        self.shared.current.send_replace(None);
        self.shared.remaining_ms.store(0, Ordering::Relaxed);

        info!("Token rotation stopped: session={}", handle.session_id);
    }

    pub fn is_running(&self) -> bool {
        self.rotation.is_some()
    }

    /// 当前轮换的会话 ID
    pub fn session_id(&self) -> Option<&str> {
        self.rotation.as_ref().map(|h| h.session_id.as_str())
    }

    /// 当前展示的签发结果
    pub fn current(&self) -> Option<Issuance> {
        self.shared.current.borrow().clone()
    }

    /// 订阅签发结果变化
    pub fn subscribe(&self) -> watch::Receiver<Option<Issuance>> {
        self.shared.current.subscribe()
    }

    /// 距下次轮换的剩余毫秒数，未运行时为 0
    pub fn remaining_ms(&self) -> u64 {
        if self.is_running() {
            self.shared.remaining_ms.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// 剩余时间占轮换间隔的比例（0.0 ~ 1.0），用于进度条
    pub fn progress(&self) -> f64 {
        if self.shared.rotation_ms == 0 {
            return 0.0;
        }
        (self.remaining_ms() as f64 / self.shared.rotation_ms as f64).clamp(0.0, 1.0)
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }
}

impl Drop for TokenIssuer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 后台轮换任务
async fn run_rotation(
    shared: Arc<Shared>,
    session_id: String,
    cancel: CancellationToken,
    started_at: Instant,
    config: IssuerConfig,
) {
    let mut rotation = interval_at(
        started_at + config.rotation_interval,
        config.rotation_interval,
    );
    rotation.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut countdown = interval_at(started_at + config.countdown_tick, config.countdown_tick);
    countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let tick_ms = u64::try_from(config.countdown_tick.as_millis()).unwrap_or(u64::MAX);
    let mut sequence = 1u64;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = countdown.tick() => {
                let _ = shared
                    .remaining_ms
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |ms| {
                        Some(ms.saturating_sub(tick_ms))
                    });
            }

            _ = rotation.tick() => match shared.issue(&session_id, sequence, &cancel) {
                Ok(true) => sequence += 1,
                Ok(false) => break,
                Err(e) => error!("Failed to issue token: session={}, error={}", session_id, e),
            },
        }
    }

    debug!("Rotation task exited: session={}", session_id);
}
