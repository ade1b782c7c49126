//! 扫码会话
//!
//! 状态保存在 `watch::Sender<ScanStatus>` 中，每次状态迁移都在
//! `send_if_modified` 内完成比较并交换，订阅方（界面、CLI）只读。
//!
//! 一次提交的流程：
//!
//! 1. `Scanning → Validating`，记录本次提交代次 `epoch`
//! 2. 解析载荷，失败即 `INVALID`
//! 3. 在校验时刻读取 `now` 并校验令牌
//! 4. 交给签到记录器做去重与持久化，写入期间被取消或违规则放弃写入
//! 5. 仅当状态仍是同一代次的 `Validating` 时才应用结果，否则丢弃

use crate::capture::{FrameDecoder, FrameSource};
use crate::error::ScanError;
use crate::state::{AccessState, MSG_DECRYPTING, MSG_INITIALIZING, MSG_RESCANNING, ScanStatus};
use crate::watchdog::{SecurityWatchdog, VisibilitySignal, WatchdogGuard};
use recorder::{AttendanceRecorder, RecordOutcome};
use sentinel_common::{Clock, SubmitterId};
use std::sync::Arc;
use token::{Token, Validator};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 签到回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub session_id: String,
    pub submitter_id: SubmitterId,
    pub nonce: String,
    pub recorded_at: i64,
    pub outcome: RecordOutcome,
}

/// 一次提交的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// 签到成功
    Granted(Receipt),
    /// 当前不在采集状态，载荷未提交
    Ignored,
    /// 提交期间会话被取消或违规终止，结果已丢弃
    Discarded,
}

/// 学生端扫码会话
///
/// 克隆得到的是同一个会话的句柄。
#[derive(Clone)]
pub struct ScanSession {
    submitter: SubmitterId,
    validator: Validator,
    recorder: Arc<AttendanceRecorder>,
    clock: Arc<dyn Clock>,
    status: Arc<watch::Sender<ScanStatus>>,
}

impl ScanSession {
    pub fn new(
        submitter: SubmitterId,
        validator: Validator,
        recorder: Arc<AttendanceRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (status, _) = watch::channel(ScanStatus::default());
        Self {
            submitter,
            validator,
            recorder,
            clock,
            status: Arc::new(status),
        }
    }

    pub fn submitter(&self) -> &SubmitterId {
        &self.submitter
    }

    pub fn status(&self) -> ScanStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> AccessState {
        self.status.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.status.subscribe()
    }

    /// 身份确认后开始采集，仅在 `Locked` 下有效
    pub fn unlock(&self) -> bool {
        let unlocked = self.status.send_if_modified(|s| {
            if s.state != AccessState::Locked {
                return false;
            }
            s.state = AccessState::Scanning;
            true
        });
        if unlocked {
            debug!("Scan session unlocked: submitter={}", self.submitter);
        }
        unlocked
    }

    /// 提交解码得到的载荷
    ///
    /// 只在 `Scanning` 下受理，其余状态返回 [`ScanOutcome::Ignored`]。
    pub async fn on_decode(&self, raw: &str) -> Result<ScanOutcome, ScanError> {
        let mut attempt = None;
        self.status.send_if_modified(|s| {
            if s.state != AccessState::Scanning {
                return false;
            }
            s.state = AccessState::Validating;
            s.message = MSG_DECRYPTING.to_string();
            s.error = None;
            s.epoch += 1;
            attempt = Some(s.epoch);
            true
        });

        let Some(epoch) = attempt else {
            debug!("Payload ignored: session is {}", self.state());
            return Ok(ScanOutcome::Ignored);
        };

        let result = match self.submit(raw, epoch).await {
            Ok(Some(receipt)) => Ok(receipt),
            Ok(None) => return Ok(self.discard(epoch)),
            Err(e) => Err(e),
        };

        self.finish(epoch, result)
    }

    /// 解析、校验、记录；记录完成前发现已被取消则返回 `Ok(None)`
    async fn submit(&self, raw: &str, epoch: u64) -> Result<Option<Receipt>, ScanError> {
        let token = Token::from_payload(raw).map_err(|e| {
            debug!("Payload rejected: {}", e);
            ScanError::invalid_format()
        })?;

        let now = self.clock.now_millis();
        self.validator.validate(&token, now)?;

        // 先订阅再检查，避免漏掉两者之间发生的取消
        let mut status = self.subscribe();
        if !self.is_current(epoch) {
            return Ok(None);
        }

        // 写入完成前被取消或判定违规则放弃写入
        let outcome = {
            let record = self
                .recorder
                .record(&token.session_id, &token.nonce, &self.submitter, now);
            tokio::pin!(record);

            loop {
                tokio::select! {
                    biased;

                    changed = status.changed() => {
                        if changed.is_err() || !self.is_current(epoch) {
                            debug!("Attendance write abandoned: attempt={} was superseded", epoch);
                            return Ok(None);
                        }
                    }

                    outcome = &mut record => break outcome?,
                }
            }
        };

        Ok(Some(Receipt {
            session_id: token.session_id,
            submitter_id: self.submitter.clone(),
            nonce: token.nonce,
            recorded_at: now,
            outcome,
        }))
    }

    fn is_current(&self, epoch: u64) -> bool {
        let status = self.status.borrow();
        status.state == AccessState::Validating && status.epoch == epoch
    }

    fn discard(&self, epoch: u64) -> ScanOutcome {
        debug!(
            "Discarding scan result: attempt={}, session is now {}",
            epoch,
            self.state()
        );
        ScanOutcome::Discarded
    }

    /// 应用提交结果
    fn finish(
        &self,
        epoch: u64,
        result: Result<Receipt, ScanError>,
    ) -> Result<ScanOutcome, ScanError> {
        let applied = self.status.send_if_modified(|s| {
            if s.state != AccessState::Validating || s.epoch != epoch {
                return false;
            }
            match &result {
                Ok(receipt) => {
                    s.state = AccessState::Granted;
                    s.message = format!("ATTENDANCE LOGGED: {}", receipt.session_id);
                    s.error = None;
                }
                Err(e) => {
                    s.state = AccessState::Denied;
                    s.message = e.to_string();
                    s.error = Some(e.clone());
                }
            }
            true
        });

        if !applied {
            return Ok(self.discard(epoch));
        }

        match result {
            Ok(receipt) => {
                info!(
                    "Access granted: session={}, submitter={}, outcome={:?}",
                    receipt.session_id, receipt.submitter_id, receipt.outcome
                );
                Ok(ScanOutcome::Granted(receipt))
            }
            Err(e) => {
                info!(
                    "Access denied: submitter={}, code={}, message={}",
                    self.submitter,
                    e.code(),
                    e
                );
                Err(e)
            }
        }
    }

    /// 在允许的状态下转入 `Denied`
    fn deny_if(&self, allowed: impl Fn(AccessState) -> bool, error: ScanError) -> bool {
        self.status.send_if_modified(|s| {
            if !allowed(s.state) {
                return false;
            }
            s.state = AccessState::Denied;
            s.message = error.to_string();
            s.error = Some(error);
            true
        })
    }

    /// 驱动采集循环，直到识别出一个载荷并提交
    ///
    /// 离开 `Scanning`（取消、违规）时立即停止，返回 [`ScanOutcome::Ignored`]；
    /// 帧来源结束同样返回 `Ignored`。
    pub async fn run_capture<S, D>(
        &self,
        source: &mut S,
        decoder: &D,
    ) -> Result<ScanOutcome, ScanError>
    where
        S: FrameSource,
        D: FrameDecoder<Frame = S::Frame>,
    {
        let mut status = self.subscribe();

        loop {
            if status.borrow_and_update().state != AccessState::Scanning {
                debug!("Capture stopped: session left scanning state");
                return Ok(ScanOutcome::Ignored);
            }

            let frame = tokio::select! {
                biased;

                changed = status.changed() => {
                    if changed.is_err() {
                        return Ok(ScanOutcome::Ignored);
                    }
                    continue;
                }

                frame = source.next_frame() => frame,
            };

            match frame {
                Ok(Some(frame)) => {
                    if let Some(payload) = decoder.decode(&frame) {
                        return self.on_decode(&payload).await;
                    }
                }
                Ok(None) => {
                    debug!("Frame source closed before a code was decoded");
                    return Ok(ScanOutcome::Ignored);
                }
                Err(e) => {
                    warn!("Camera failure: submitter={}, error={}", self.submitter, e);
                    let error = ScanError::CameraError { reason: e.reason };
                    if self.deny_if(|s| s == AccessState::Scanning, error.clone()) {
                        return Err(error);
                    }
                    return Ok(ScanOutcome::Ignored);
                }
            }
        }
    }

    /// 返回锁定状态，进行中的提交结果将被丢弃
    pub fn cancel(&self) {
        self.status.send_modify(|s| {
            s.state = AccessState::Locked;
            s.message = MSG_INITIALIZING.to_string();
            s.error = None;
            s.epoch += 1;
        });
        debug!("Scan session cancelled: submitter={}", self.submitter);
    }

    /// 失败后重新开始采集，仅在 `Denied` 下有效
    pub fn retry(&self) -> bool {
        self.status.send_if_modified(|s| {
            if s.state != AccessState::Denied {
                return false;
            }
            s.state = AccessState::Scanning;
            s.message = MSG_RESCANNING.to_string();
            s.error = None;
            true
        })
    }

    /// 看门狗回调：采集或校验中切到后台即判定违规
    pub fn report_violation(&self) -> bool {
        let denied = self.deny_if(AccessState::is_guarded, ScanError::SecurityViolation);
        if denied {
            warn!(
                "Security violation: app backgrounded, submitter={}",
                self.submitter
            );
        }
        denied
    }

    /// 将看门狗接到本会话，返回的 guard 释放即停止监听
    pub fn guard<V: VisibilitySignal + ?Sized>(&self, signal: &V) -> WatchdogGuard {
        let observed = self.clone();
        let reporter = self.clone();
        SecurityWatchdog::watch(
            signal,
            move || observed.state(),
            move || {
                reporter.report_violation();
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraError, ChannelFrameSource, PayloadDecoder};
    use crate::watchdog::VisibilityBus;
    use async_trait::async_trait;
    use recorder::{AttendanceRecord, AttendanceStore, MemoryAttendanceStore, StoreError};
    use sentinel_common::{FailurePolicy, ManualClock};
    use std::time::Duration;

    const DEMO_MAX_AGE_MS: u64 = 7_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        recorder: Arc<AttendanceRecorder>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_store(Arc::new(MemoryAttendanceStore::new()), FailurePolicy::FailClosed)
        }

        fn with_store(store: Arc<dyn AttendanceStore>, policy: FailurePolicy) -> Self {
            Self {
                clock: Arc::new(ManualClock::new(0)),
                recorder: Arc::new(AttendanceRecorder::new(store, policy)),
            }
        }

        fn session(&self, submitter: &str) -> ScanSession {
            ScanSession::new(
                SubmitterId::new(submitter).unwrap(),
                Validator::new(DEMO_MAX_AGE_MS),
                self.recorder.clone(),
                self.clock.clone(),
            )
        }
    }

    fn payload(session: &str, issued_at: i64, nonce: &str) -> String {
        Token::new(session, issued_at, nonce).to_payload().unwrap()
    }

    /// 插入前等待一段时间的存储
    struct SlowStore {
        inner: MemoryAttendanceStore,
        delay: Duration,
    }

    #[async_trait]
    impl AttendanceStore for SlowStore {
        async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.insert(record).await
        }

        async fn count(&self, session_id: &str) -> Result<u64, StoreError> {
            self.inner.count(session_id).await
        }
    }

    struct DownStore;

    #[async_trait]
    impl AttendanceStore for DownStore {
        async fn insert(&self, _record: &AttendanceRecord) -> Result<(), StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn count(&self, _session_id: &str) -> Result<u64, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_unlock_only_from_locked() {
        let fx = Fixture::new();
        let session = fx.session("S1");
        assert_eq!(session.status().message, "INITIALIZING...");

        assert!(session.unlock());
        assert_eq!(session.state(), AccessState::Scanning);
        assert!(!session.unlock());
    }

    #[tokio::test]
    async fn test_fresh_token_granted() {
        let fx = Fixture::new();
        let session = fx.session("S1");
        session.unlock();

        fx.clock.set(6_999);
        let outcome = session.on_decode(&payload("CS-404", 0, "n0")).await.unwrap();

        let ScanOutcome::Granted(receipt) = outcome else {
            panic!("expected grant, got {outcome:?}");
        };
        assert_eq!(receipt.session_id, "CS-404");
        assert_eq!(receipt.recorded_at, 6_999);
        assert_eq!(receipt.outcome, RecordOutcome::Recorded);

        let status = session.status();
        assert_eq!(status.state, AccessState::Granted);
        assert_eq!(status.message, "ATTENDANCE LOGGED: CS-404");
        assert_eq!(fx.recorder.count("CS-404").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stale_token_expired() {
        let fx = Fixture::new();
        let session = fx.session("S1");
        session.unlock();

        fx.clock.set(7_001);
        let err = session
            .on_decode(&payload("CS-404", 0, "n0"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "EXPIRED");
        let status = session.status();
        assert_eq!(status.state, AccessState::Denied);
        assert_eq!(status.message, "QR EXPIRED - REFRESH REQUIRED");
        assert_eq!(status.error, Some(err));
        assert_eq!(fx.recorder.count("CS-404").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_and_structurally_invalid_payloads() {
        let fx = Fixture::new();
        let session = fx.session("S1");

        session.unlock();
        let err = session.on_decode("hello world").await.unwrap_err();
        assert_eq!(err.code(), "INVALID");
        assert_eq!(session.status().message, "INVALID DATA FORMAT");

        assert!(session.retry());
        assert_eq!(session.status().message, "RESCANNING...");

        // 结构检查先于新鲜度：缺 nonce 且过期仍判为 INVALID
        fx.clock.set(60_000);
        let err = session
            .on_decode(&payload("CS-404", 0, ""))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID");
        assert_eq!(session.status().message, "MALFORMED PAYLOAD DETECTED");
    }

    #[tokio::test]
    async fn test_second_scan_in_same_session_is_duplicate() {
        let fx = Fixture::new();
        let first = fx.session("S1");
        first.unlock();
        first.on_decode(&payload("CS-404", 0, "n0")).await.unwrap();

        let again = fx.session("S1");
        again.unlock();
        let err = again
            .on_decode(&payload("CS-404", 0, "n1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE");
        assert_eq!(again.status().message, "ALREADY CHECKED IN: CS-404");

        let other = fx.session("S2");
        other.unlock();
        assert!(matches!(
            other.on_decode(&payload("CS-404", 0, "n1")).await,
            Ok(ScanOutcome::Granted(_))
        ));
    }

    #[tokio::test]
    async fn test_store_outage_respects_failure_policy() {
        let closed = Fixture::with_store(Arc::new(DownStore), FailurePolicy::FailClosed);
        let session = closed.session("S1");
        session.unlock();
        let err = session
            .on_decode(&payload("CS-404", 0, "n0"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "OTHER_ERROR");

        let open = Fixture::with_store(Arc::new(DownStore), FailurePolicy::FailOpen);
        let session = open.session("S1");
        session.unlock();
        let outcome = session.on_decode(&payload("CS-404", 0, "n0")).await.unwrap();
        assert!(matches!(
            outcome,
            ScanOutcome::Granted(Receipt {
                outcome: RecordOutcome::AcceptedUnconfirmed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_decode_outside_scanning_is_ignored() {
        let fx = Fixture::new();
        let session = fx.session("S1");

        assert_eq!(
            session.on_decode(&payload("CS-404", 0, "n0")).await.unwrap(),
            ScanOutcome::Ignored
        );

        session.unlock();
        session.on_decode(&payload("CS-404", 0, "n0")).await.unwrap();
        // 终态下不再受理
        assert_eq!(
            session.on_decode(&payload("CS-404", 0, "n1")).await.unwrap(),
            ScanOutcome::Ignored
        );
        assert!(!session.retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_in_flight_result() {
        let store = Arc::new(SlowStore {
            inner: MemoryAttendanceStore::new(),
            delay: Duration::from_millis(600),
        });
        let fx = Fixture::with_store(store, FailurePolicy::FailClosed);
        let session = fx.session("S1");
        session.unlock();

        let submitting = session.clone();
        let raw = payload("CS-404", 0, "n0");
        let handle = tokio::spawn(async move { submitting.on_decode(&raw).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.state(), AccessState::Validating);
        session.cancel();

        assert_eq!(handle.await.unwrap(), Ok(ScanOutcome::Discarded));
        let status = session.status();
        assert_eq!(status.state, AccessState::Locked);
        assert_eq!(status.message, "INITIALIZING...");

        // 等过原本的写入时长，确认没有落盘
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(fx.recorder.count("CS-404").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_violation_during_validation_wins() {
        let store = Arc::new(SlowStore {
            inner: MemoryAttendanceStore::new(),
            delay: Duration::from_millis(600),
        });
        let fx = Fixture::with_store(store, FailurePolicy::FailClosed);
        let session = fx.session("S1");
        let bus = VisibilityBus::new();
        let _guard = session.guard(&bus);
        session.unlock();

        let submitting = session.clone();
        let raw = payload("CS-404", 0, "n0");
        let handle = tokio::spawn(async move { submitting.on_decode(&raw).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        bus.hide();

        assert_eq!(handle.await.unwrap(), Ok(ScanOutcome::Discarded));
        let status = session.status();
        assert_eq!(status.state, AccessState::Denied);
        assert_eq!(status.error, Some(ScanError::SecurityViolation));
        assert_eq!(status.message, "SECURITY VIOLATION: APP BACKGROUNDED");

        // 被判定违规的这次提交不能留下签到记录
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(fx.recorder.count("CS-404").await.unwrap(), 0);

        // 回到前台后重试可以正常签到
        bus.show();
        assert!(session.retry());
        let outcome = session.on_decode(&payload("CS-404", 0, "n1")).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Granted(_)), "{outcome:?}");
        assert_eq!(fx.recorder.count("CS-404").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backgrounding_while_locked_is_harmless() {
        let fx = Fixture::new();
        let session = fx.session("S1");
        let bus = VisibilityBus::new();
        let _guard = session.guard(&bus);

        bus.hide();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.state(), AccessState::Locked);
        assert!(!session.report_violation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_submits_first_decoded_frame() {
        let fx = Fixture::new();
        let session = fx.session("S1");
        session.unlock();

        let (tx, mut source) = ChannelFrameSource::channel(8);
        tx.send(Ok("   ".to_string())).await.unwrap();
        tx.send(Ok(payload("CS-404", 0, "n0"))).await.unwrap();
        tx.send(Ok(payload("CS-404", 0, "n1"))).await.unwrap();

        let outcome = session.run_capture(&mut source, &PayloadDecoder).await.unwrap();
        let ScanOutcome::Granted(receipt) = outcome else {
            panic!("expected grant, got {outcome:?}");
        };
        assert_eq!(receipt.nonce, "n0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_camera_failure_denies() {
        let fx = Fixture::new();
        let session = fx.session("S1");
        session.unlock();

        let (tx, mut source) = ChannelFrameSource::<String>::channel(1);
        tx.send(Err(CameraError::new("permission denied"))).await.unwrap();

        let err = session
            .run_capture(&mut source, &PayloadDecoder)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CAMERA_ERROR");
        assert_eq!(session.status().message, "CAMERA ACCESS DENIED");

        assert!(session.retry());
        assert_eq!(session.state(), AccessState::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_stops_when_cancelled() {
        let fx = Fixture::new();
        let session = fx.session("S1");
        session.unlock();

        // 发送端保持打开，采集循环会一直等待帧
        let (_tx, mut source) = ChannelFrameSource::<String>::channel(1);
        let capturing = session.clone();
        let handle =
            tokio::spawn(async move { capturing.run_capture(&mut source, &PayloadDecoder).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        session.cancel();

        assert_eq!(handle.await.unwrap(), Ok(ScanOutcome::Ignored));
        assert_eq!(session.state(), AccessState::Locked);
    }
}
