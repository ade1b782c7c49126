//! 访问状态

use crate::error::ScanError;
use std::fmt;

/// 初始与取消后的状态文案
pub(crate) const MSG_INITIALIZING: &str = "INITIALIZING...";
pub(crate) const MSG_DECRYPTING: &str = "DECRYPTING PAYLOAD...";
pub(crate) const MSG_RESCANNING: &str = "RESCANNING...";

/// 扫码会话的访问状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessState {
    /// 等待身份解锁
    Locked,
    /// 摄像头采集中
    Scanning,
    /// 已取得载荷，采集冻结，正在校验与记录
    Validating,
    /// 签到成功（终态）
    Granted,
    /// 签到失败（终态）
    Denied,
}

impl AccessState {
    /// 看门狗守护的状态
    pub fn is_guarded(self) -> bool {
        matches!(self, Self::Scanning | Self::Validating)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Granted | Self::Denied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "LOCKED",
            Self::Scanning => "SCANNING",
            Self::Validating => "VALIDATING",
            Self::Granted => "GRANTED",
            Self::Denied => "DENIED",
        }
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对外发布的会话状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStatus {
    pub state: AccessState,
    /// 状态栏文案
    pub message: String,
    /// `Denied` 时的失败原因
    pub error: Option<ScanError>,
    /// 提交代次，每次进入 `Validating` 或取消时递增
    pub epoch: u64,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self {
            state: AccessState::Locked,
            message: MSG_INITIALIZING.to_string(),
            error: None,
            epoch: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_and_terminal_states() {
        let guarded: Vec<_> = [
            AccessState::Locked,
            AccessState::Scanning,
            AccessState::Validating,
            AccessState::Granted,
            AccessState::Denied,
        ]
        .into_iter()
        .filter(|s| s.is_guarded())
        .collect();
        assert_eq!(guarded, vec![AccessState::Scanning, AccessState::Validating]);

        assert!(AccessState::Granted.is_terminal());
        assert!(AccessState::Denied.is_terminal());
        assert!(!AccessState::Validating.is_terminal());
    }

    #[test]
    fn test_initial_status() {
        let status = ScanStatus::default();
        assert_eq!(status.state, AccessState::Locked);
        assert_eq!(status.message, "INITIALIZING...");
        assert_eq!(status.to_owned().state.to_string(), "LOCKED");
    }
}
