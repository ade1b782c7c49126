//! 二维码渲染能力
//!
//! 签发器只产出载荷字符串，如何把它画成可扫描的图形由展示层决定。
//! 这里提供终端用的 [`TextRenderer`]，图形界面可实现自己的 [`CodeRenderer`]。

use crate::error::RenderError;
use crate::issuer::Issuance;
use tracing::error;

/// 把载荷渲染为可展示的形式
pub trait CodeRenderer: Send + Sync {
    type Output;

    fn render(&self, payload: &str) -> Result<Self::Output, RenderError>;
}

/// 终端文本渲染：把载荷装进一个带边框的方框
#[derive(Debug, Clone)]
pub struct TextRenderer {
    width: usize,
}

/// 单个方框能容纳的最大载荷长度
const MAX_TEXT_PAYLOAD: usize = 4_096;

impl Default for TextRenderer {
    fn default() -> Self {
        Self { width: 64 }
    }
}

impl TextRenderer {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(8),
        }
    }

    fn framed(&self, lines: &[String]) -> String {
        let inner = self.width - 4;
        let border = format!("+{}+", "-".repeat(self.width - 2));

        let mut out = String::with_capacity((lines.len() + 2) * (self.width + 1));
        out.push_str(&border);
        out.push('\n');
        for line in lines {
            out.push_str(&format!("| {line:<inner$} |\n"));
        }
        out.push_str(&border);
        out
    }
}

impl CodeRenderer for TextRenderer {
    type Output = String;

    fn render(&self, payload: &str) -> Result<String, RenderError> {
        if payload.is_empty() {
            return Err(RenderError::EmptyPayload);
        }
        if payload.len() > MAX_TEXT_PAYLOAD {
            return Err(RenderError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_TEXT_PAYLOAD,
            });
        }

        let inner = self.width - 4;
        let chars: Vec<char> = payload.chars().collect();
        let lines: Vec<String> = chars
            .chunks(inner)
            .map(|chunk| chunk.iter().collect())
            .collect();

        Ok(self.framed(&lines))
    }
}

/// 渲染一次签发结果，失败只记录日志
///
/// 文本渲染器的输出会附加 `SESSION_HASH` 行。
pub fn render_issuance<R: CodeRenderer>(renderer: &R, issuance: &Issuance) -> Option<R::Output> {
    match renderer.render(&issuance.payload) {
        Ok(output) => Some(output),
        Err(e) => {
            error!(
                "Failed to render token: session={}, sequence={}, error={}",
                issuance.token.session_id, issuance.sequence, e
            );
            None
        }
    }
}

impl TextRenderer {
    /// 渲染签发结果并在下方附上会话哈希
    pub fn render_with_hash(&self, issuance: &Issuance) -> Option<String> {
        render_issuance(self, issuance)
            .map(|framed| format!("{framed}\nSESSION_HASH: {}", issuance.session_hash()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use token::Token;

    fn issuance(payload: &str) -> Issuance {
        Issuance {
            token: Token::new("CS-404", 0, "k3j5h2"),
            payload: payload.to_string(),
            sequence: 3,
        }
    }

    #[test]
    fn test_text_renderer_frames_payload() {
        let renderer = TextRenderer::new(20);
        let out = renderer.render("abcdefghijklmnopqrstuvwxyz").unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| l.chars().count() == 20));
        assert_eq!(lines[0], format!("+{}+", "-".repeat(18)));
        assert_eq!(lines[1], "| abcdefghijklmnop |");
        assert_eq!(lines[2], "| qrstuvwxyz       |");
    }

    #[test]
    fn test_text_renderer_rejects_bad_payloads() {
        let renderer = TextRenderer::default();
        assert!(matches!(renderer.render(""), Err(RenderError::EmptyPayload)));

        let huge = "x".repeat(MAX_TEXT_PAYLOAD + 1);
        assert!(matches!(
            renderer.render(&huge),
            Err(RenderError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_render_with_hash() {
        let renderer = TextRenderer::default();
        let out = renderer.render_with_hash(&issuance("{\"classId\":\"CS-404\"}")).unwrap();
        assert!(out.contains("CS-404"));
        assert!(out.ends_with("SESSION_HASH: K3J5H2"));
    }

    #[test]
    fn test_render_failure_does_not_panic() {
        assert!(render_issuance(&TextRenderer::default(), &issuance("")).is_none());
    }
}
