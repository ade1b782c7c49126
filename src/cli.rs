//! 命令行界面定义
//!
//! 定义了主程序的命令行参数和选项
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(version)]
#[command(
    about = "Rotating-QR attendance: lecturer token issuer, student scanner and attendance ledger"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Configuration file path (defaults to searching standard locations)
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub(crate) config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Rotate attendance tokens for a lecture session
    Lecturer {
        /// Session (class) identifier embedded in every token
        #[arg(long)]
        session: String,

        /// Stop after this many tokens have been shown (runs until Ctrl-C if omitted)
        #[arg(long)]
        rotations: Option<u64>,
    },

    /// Scan one token and record attendance
    Student {
        /// Submitter (student) identifier
        #[arg(long)]
        submitter: String,

        /// Scanned payload; read from stdin, one frame per line, if omitted
        #[arg(long)]
        payload: Option<String>,
    },

    /// Print the number of recorded attendances for a session
    Count {
        #[arg(long)]
        session: String,
    },

    /// Test configuration file
    Test {
        /// Configuration file path (optional, defaults to config.toml)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },
}
