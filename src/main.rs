//! Sentinel 考勤命令行
//!
//! - `lecturer`：按固定间隔轮换令牌并在终端展示
//! - `student`：扫描一个载荷（参数或标准输入）并记录签到
//! - `count`：查询会话签到人数
//! - `test`：检查配置文件

mod cli;
mod error;
mod observability;

use clap::Parser;
use issuer::{IssuerConfig, TextRenderer, TokenIssuer};
use observability::init_observability;
use recorder::{AttendanceRecorder, RecordOutcome};
use scanner::{LineFrameSource, PayloadDecoder, ScanOutcome, ScanSession};
use sentinel_common::{SentinelConfig, SubmitterId, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use token::Validator;
use tokio::io::BufReader;

use tracing::{error, info, warn};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands};
use error::{Error, Result};

/// 系统级配置文件位置
const SYSTEM_CONFIG_PATH: &str = "/etc/sentinel/config.toml";

/// 讲师端倒计时打印间隔
const COUNTDOWN_PRINT_INTERVAL: Duration = Duration::from_secs(1);

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Test { config_file } => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?
                    .ok_or_else(|| {
                        bootstrap_error!("No configuration file found!");
                        bootstrap_error!(
                            "Please create config.toml or {SYSTEM_CONFIG_PATH}, or pass a path: sentinel test <path>"
                        );
                        Error::custom(
                            "No configuration file found. Please create one or specify path with --config",
                        )
                    })?;
            ApplicationLauncher::test_config_file(&config_path)
        }
        command => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;
            let config = ApplicationLauncher::load_config(config_path.as_deref())?;

            // Create Tokio runtime（before running the application）
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(ApplicationLauncher::run_command(config, command))
        }
    }
}

impl ApplicationLauncher {
    /// Find config file with fallback locations
    ///
    /// 显式指定的路径必须存在；默认路径都找不到时返回 `None`，由调用方决定是否使用内置默认值。
    fn find_config_file(provided_path: &PathBuf) -> Result<Option<PathBuf>> {
        if provided_path != Path::new("config.toml") {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(Some(provided_path.clone()));
            }
            bootstrap_error!("Provided config file not found: {:?}", provided_path);
            return Err(Error::custom(format!(
                "Config file not found: {provided_path:?}"
            )));
        }

        let fallback_paths = [
            // 1. Current working directory
            PathBuf::from("config.toml"),
            // 2. System config directory
            PathBuf::from(SYSTEM_CONFIG_PATH),
        ];

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(Some(path.clone()));
            }
        }

        Ok(None)
    }

    /// 加载并验证配置，未找到配置文件时使用内置默认值（演示模式）
    fn load_config(config_path: Option<&Path>) -> Result<SentinelConfig> {
        let config = match config_path {
            Some(path) => SentinelConfig::from_file(path).map_err(|e| {
                bootstrap_error!("❌ 配置加载失败: {}", e);
                Error::custom(format!("配置加载失败: {e}"))
            })?,
            None => {
                bootstrap_info!("No config file found, using built-in defaults (demo profile)");
                SentinelConfig::default()
            }
        };

        if let Err(errors) = config.validate() {
            let mut has_critical_errors = false;
            for (i, err) in errors.iter().enumerate() {
                if err.starts_with("Warning:") {
                    bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                } else {
                    bootstrap_error!("  {}. ❌ {}", i + 1, err);
                    has_critical_errors = true;
                }
            }
            if has_critical_errors {
                return Err(Error::config_validation("配置验证失败，请修复上述错误"));
            }
        }

        Ok(config)
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &Path) -> Result<()> {
        // Initialize basic logging for test command
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();

        let config = SentinelConfig::from_file(config_path).map_err(|e| {
            error!("❌ 配置文件解析失败: {}", e);
            Error::config_validation(format!("配置解析失败: {e}"))
        })?;
        info!("✅ 配置文件解析成功: {:?}", config_path);

        if let Err(errors) = config.validate() {
            for (i, err) in errors.iter().enumerate() {
                if err.starts_with("Warning:") {
                    warn!("  {}. ⚠️  {}", i + 1, err);
                } else {
                    error!("  {}. ❌ {}", i + 1, err);
                }
            }
            if errors.iter().any(|e| !e.starts_with("Warning:")) {
                return Err(Error::config_validation("配置验证失败"));
            }
        }

        info!(
            "✅ 配置验证通过: profile={:?}, rotation={}ms, max_token_age={}ms, backend={:?}",
            config.protocol.profile,
            config.protocol.rotation_interval_ms(),
            config.protocol.max_token_age_ms(),
            config.recorder.backend
        );
        Ok(())
    }

    /// 运行子命令
    async fn run_command(config: SentinelConfig, command: &Commands) -> Result<()> {
        let _observability_guard = init_observability(&config)?;
        info!(
            "Sentinel starting: name={}, env={}, profile={:?}",
            config.name, config.env, config.protocol.profile
        );

        match command {
            Commands::Lecturer { session, rotations } => {
                Self::run_lecturer(&config, session, *rotations).await
            }
            Commands::Student { submitter, payload } => {
                Self::run_student(&config, submitter, payload.as_deref()).await
            }
            Commands::Count { session } => Self::run_count(&config, session).await,
            Commands::Test { .. } => Ok(()),
        }
    }

    /// 讲师端：轮换令牌直到 Ctrl-C 或达到指定次数
    async fn run_lecturer(
        config: &SentinelConfig,
        session: &str,
        rotations: Option<u64>,
    ) -> Result<()> {
        let mut issuer = TokenIssuer::new(
            IssuerConfig::from_protocol(&config.protocol),
            Arc::new(SystemClock),
        );
        let mut updates = issuer.subscribe();
        issuer.start(session)?;

        let renderer = TextRenderer::default();
        let mut shown = 0u64;
        let mut countdown = tokio::time::interval(COUNTDOWN_PRINT_INTERVAL);
        countdown.tick().await;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("收到Ctrl-C信号，停止令牌轮换...");
                    break;
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let Some(issuance) = updates.borrow_and_update().clone() else {
                        continue;
                    };

                    if let Some(frame) = renderer.render_with_hash(&issuance) {
                        println!("{frame}");
                    }
                    println!("PAYLOAD: {}", issuance.payload);

                    shown += 1;
                    if rotations.is_some_and(|limit| shown >= limit) {
                        break;
                    }
                }
                _ = countdown.tick() => {
                    println!(
                        "NEXT ROTATION IN {:.1}s ({:.0}%)",
                        issuer.remaining_ms() as f64 / 1000.0,
                        issuer.progress() * 100.0
                    );
                }
            }
        }

        issuer.stop();
        info!("Lecturer session finished: session={}, tokens_shown={}", session, shown);
        Ok(())
    }

    /// 学生端：一次扫码会话
    async fn run_student(
        config: &SentinelConfig,
        submitter: &str,
        payload: Option<&str>,
    ) -> Result<()> {
        let submitter = SubmitterId::new(submitter)?;
        let recorder = Arc::new(AttendanceRecorder::from_config(&config.recorder).await?);
        let session = ScanSession::new(
            submitter,
            Validator::from_config(&config.protocol),
            recorder,
            Arc::new(SystemClock),
        );

        session.unlock();
        let result = match payload {
            Some(raw) => session.on_decode(raw).await,
            None => {
                bootstrap_info!("Waiting for QR payload on stdin (one per line)...");
                let mut source = LineFrameSource::new(BufReader::new(tokio::io::stdin()));
                tokio::select! {
                    result = session.run_capture(&mut source, &PayloadDecoder) => result,
                    _ = tokio::signal::ctrl_c() => {
                        session.cancel();
                        Ok(ScanOutcome::Discarded)
                    }
                }
            }
        };

        let status = session.status();
        println!("STATUS: {} {}", status.state, status.message);

        match result? {
            ScanOutcome::Granted(receipt) => {
                if receipt.outcome == RecordOutcome::AcceptedUnconfirmed {
                    println!("NOTE: attendance store unreachable, record not confirmed");
                }
                Ok(())
            }
            ScanOutcome::Ignored | ScanOutcome::Discarded => {
                Err(Error::custom("No payload was submitted"))
            }
        }
    }

    async fn run_count(config: &SentinelConfig, session: &str) -> Result<()> {
        let recorder = AttendanceRecorder::from_config(&config.recorder).await?;
        let count = recorder.count(session).await?;
        println!("{session}: {count}");
        Ok(())
    }
}
