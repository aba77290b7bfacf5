//! Command-line arguments for the agent binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dropship_telemetry::LogFormat;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dropship/agent.json";

/// Arguments accepted by `dropship-agent`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dropship-agent",
    about = "Installs files pushed by the Dropship controller"
)]
pub struct AgentArgs {
    /// Path of the JSON configuration file.
    #[arg(long, env = "DROPSHIP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Log filter directive overriding the configured level.
    #[arg(long)]
    pub log_level: Option<String>,
    /// Log output format overriding the configured one.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

/// Log formats selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
        }
    }
}
