//! 帧采集能力
//!
//! 摄像头与光学解码不在协议范围内，这里只定义能力边界：
//!
//! - [`FrameSource`]：异步产出帧，摄像头故障返回 [`CameraError`]
//! - [`FrameDecoder`]：从帧中识别二维码载荷，识别不到返回 `None`
//!
//! 以及两个不依赖硬件的实现：按行读取的 [`LineFrameSource`] 和基于通道的
//! [`ChannelFrameSource`]，二者产出的帧即载荷文本，配合 [`PayloadDecoder`] 使用。

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;

/// 摄像头错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Camera unavailable: {reason}")]
pub struct CameraError {
    pub reason: String,
}

impl CameraError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// 帧来源
#[async_trait]
pub trait FrameSource: Send {
    type Frame: Send;

    /// 下一帧；来源结束时返回 `Ok(None)`
    ///
    /// 必须是取消安全的：采集循环在状态变化时会丢弃未完成的调用。
    async fn next_frame(&mut self) -> Result<Option<Self::Frame>, CameraError>;
}

/// 帧解码
pub trait FrameDecoder: Send + Sync {
    type Frame;

    fn decode(&self, frame: &Self::Frame) -> Option<String>;
}

/// 文本帧解码：帧本身就是载荷，空白帧视为未识别
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadDecoder;

impl FrameDecoder for PayloadDecoder {
    type Frame = String;

    fn decode(&self, frame: &String) -> Option<String> {
        let trimmed = frame.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// 按行读取帧（例如标准输入）
pub struct LineFrameSource<R> {
    lines: Lines<R>,
}

impl<R> LineFrameSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R> FrameSource for LineFrameSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    type Frame = String;

    async fn next_frame(&mut self) -> Result<Option<String>, CameraError> {
        self.lines
            .next_line()
            .await
            .map_err(|e| CameraError::new(e.to_string()))
    }
}

/// 通道帧来源，发送端发送 `Err` 可模拟摄像头故障
pub struct ChannelFrameSource<F> {
    rx: mpsc::Receiver<Result<F, CameraError>>,
}

impl<F: Send> ChannelFrameSource<F> {
    pub fn new(rx: mpsc::Receiver<Result<F, CameraError>>) -> Self {
        Self { rx }
    }

    /// 创建一对发送端与帧来源
    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<F, CameraError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl<F: Send> FrameSource for ChannelFrameSource<F> {
    type Frame = F;

    async fn next_frame(&mut self) -> Result<Option<F>, CameraError> {
        self.rx.recv().await.transpose()
    }
}
