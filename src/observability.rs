//! 日志与追踪初始化
//!
//! 控制台或文件输出（可按天轮转），`RUST_LOG` 优先于配置中的过滤级别；
//! 启用 `opentelemetry` feature 后可把 span 导出到 OTLP 后端。

use sentinel_common::config::{LogConfig, ObservabilityConfig, SentinelConfig};
use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[cfg(feature = "opentelemetry")]
use crate::error::Error;
use crate::error::Result;
#[cfg(feature = "opentelemetry")]
use opentelemetry::KeyValue;
#[cfg(feature = "opentelemetry")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "opentelemetry")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "opentelemetry")]
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};

/// Guard for observability resources (tracer provider and log writer)
#[derive(Default)]
pub struct ObservabilityGuard {
    #[cfg(feature = "opentelemetry")]
    tracer_provider: Option<SdkTracerProvider>,
    log_guard: Option<WorkerGuard>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        #[cfg(feature = "opentelemetry")]
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown tracer provider: {e:?}");
        }
    }
}

/// Initialize logging and tracing based on configuration
pub fn init_observability(config: &SentinelConfig) -> Result<ObservabilityGuard> {
    let mut guard = ObservabilityGuard::default();
    let observability_config = config.observability_config();

    match observability_config.log.output.as_str() {
        "file" => {
            fs::create_dir_all(&observability_config.log.path)?;
            let (non_blocking, worker_guard) =
                build_file_writer(&observability_config.log, observability_config.log.rotate)?;
            guard.log_guard = Some(worker_guard);

            init_subscriber_with_writer(non_blocking, false, &mut guard, config)?;
        }
        _ => {
            // 标准输出留给命令结果（令牌载荷、扫码状态）
            init_subscriber_with_writer(std::io::stderr, true, &mut guard, config)?;
        }
    }

    Ok(guard)
}

/// 过滤指令：非空的 `RUST_LOG` 优先，否则取配置
fn filter_directive(config: &ObservabilityConfig, rust_log: Option<String>) -> String {
    rust_log
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config.filter_level.clone())
}

fn create_env_filter(config: &ObservabilityConfig) -> EnvFilter {
    let directive = filter_directive(config, std::env::var("RUST_LOG").ok());

    EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        eprintln!(
            "Failed to parse filter directive: {}. Falling back to default: info",
            directive
        );
        EnvFilter::new("info")
    })
}

fn init_subscriber_with_writer<W>(
    writer: W,
    use_ansi: bool,
    #[cfg_attr(not(feature = "opentelemetry"), allow(unused_variables))]
    guard: &mut ObservabilityGuard,
    config: &SentinelConfig,
) -> Result<()>
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(use_ansi)
        .with_writer(writer);

    let observability_config = config.observability_config();

    #[cfg(feature = "opentelemetry")]
    let otel_layer = match build_tracing_provider(config)? {
        Some(provider) => {
            use opentelemetry::trace::TracerProvider as _;
            let tracer = provider.tracer(observability_config.tracing.service_name().to_string());
            guard.tracer_provider = Some(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    // 全局过滤：事件先经过 EnvFilter，再分发到各 layer
    let subscriber = tracing_subscriber::registry()
        .with(create_env_filter(observability_config))
        .with(fmt_layer);

    #[cfg(feature = "opentelemetry")]
    let subscriber = subscriber.with(otel_layer);

    if subscriber.try_init().is_err() {
        eprintln!("Global tracing subscriber already installed, keeping the existing one");
    }

    Ok(())
}

fn build_file_writer(
    log_config: &LogConfig,
    rotate: bool,
) -> Result<(NonBlocking, WorkerGuard)> {
    eprintln!("日志写入模式: 文件");
    eprintln!("  - 路径: {}", log_config.path);
    eprintln!("  - 轮转: {}", if rotate { "开启（按天）" } else { "关闭" });

    if rotate {
        let file_appender = tracing_appender::rolling::daily(&log_config.path, "sentinel.log");
        Ok(tracing_appender::non_blocking(file_appender))
    } else {
        let log_file_path = std::path::Path::new(&log_config.path).join("sentinel.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)?;
        Ok(tracing_appender::non_blocking(file))
    }
}

#[cfg(feature = "opentelemetry")]
fn build_tracing_provider(config: &SentinelConfig) -> Result<Option<SdkTracerProvider>> {
    let tracing_cfg = config.tracing_config();

    if !tracing_cfg.is_enabled() {
        eprintln!("📊 OpenTelemetry tracing is disabled in config");
        return Ok(None);
    }

    if let Err(e) = tracing_cfg.validate() {
        return Err(Error::custom(e));
    }

    eprintln!(
        "📊 Initializing OpenTelemetry tracing: service_name={}, endpoint={}",
        tracing_cfg.service_name(),
        tracing_cfg.endpoint()
    );

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(tracing_cfg.endpoint())
        .build()
        .map_err(|e| Error::custom(format!("Failed to build OTLP exporter: {e}")))?;

    let resource = Resource::builder()
        .with_service_name(tracing_cfg.service_name().to_string())
        .with_attributes([
            KeyValue::new("service.instance.id", config.name.clone()),
            KeyValue::new("service.environment", config.env.clone()),
            KeyValue::new(
                "sentinel.protocol.profile",
                format!("{:?}", config.protocol.profile).to_lowercase(),
            ),
        ])
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    opentelemetry::global::set_tracer_provider(tracer_provider.clone());
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    eprintln!("✅ OpenTelemetry tracing initialized successfully");

    Ok(Some(tracer_provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_takes_precedence() {
        let config = ObservabilityConfig {
            filter_level: "debug,sqlx=warn".to_string(),
            ..ObservabilityConfig::default()
        };

        assert_eq!(
            filter_directive(&config, Some("trace".to_string())),
            "trace"
        );
        assert_eq!(
            filter_directive(&config, Some("   ".to_string())),
            "debug,sqlx=warn"
        );
        assert_eq!(filter_directive(&config, None), "debug,sqlx=warn");
    }

    #[test]
    fn test_file_writer_appends_to_sentinel_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_config = LogConfig {
            output: "file".to_string(),
            rotate: false,
            path: dir.path().display().to_string(),
        };

        let (_writer, _guard) = build_file_writer(&log_config, false).unwrap();
        assert!(dir.path().join("sentinel.log").exists());
    }
}
