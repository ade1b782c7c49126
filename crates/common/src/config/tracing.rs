//! OpenTelemetry 追踪配置
//!
//! 仅在编译时启用 `opentelemetry` feature 时生效，用于把签发、校验、
//! 记录过程中的 span 导出到 OTLP 后端。

use serde::{Deserialize, Serialize};

fn default_service_name() -> String {
    "sentinel".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:4317".to_string()
}

/// OpenTelemetry 追踪配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// 是否启用追踪导出（默认关闭）
    #[serde(default)]
    pub enable: bool,

    /// 上报时使用的服务名
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP gRPC 端点，例如 `http://otel-collector:4317`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enable: false,
            service_name: default_service_name(),
            endpoint: default_endpoint(),
        }
    }
}

impl TracingConfig {
    /// 校验追踪配置；未启用时不做检查
    pub fn validate(&self) -> Result<(), String> {
        if !self.enable {
            return Ok(());
        }
        if self.service_name.trim().is_empty() {
            return Err("Tracing service_name cannot be empty when tracing is enabled".to_string());
        }
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err("Tracing endpoint cannot be empty when tracing is enabled".to_string());
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(format!(
                "Tracing endpoint '{endpoint}' must start with http:// or https://"
            ));
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enable
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}
