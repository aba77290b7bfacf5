//! Agent boot sequence.
//!
//! # Design
//! - Load configuration first so logging honours the configured level and format.
//! - Command-line flags override the configuration file for logging only.
//! - The SSH handshake is blocking, so it runs on the blocking pool like every upload.

use std::sync::Arc;

use dropship_config::{AgentConfig, SshSettings};
use dropship_telemetry::{LogFormat, LoggingConfig};
use dropship_upload::{LocalFileSystem, SftpSource, UploadManager};
use tokio::io::BufReader;
use tracing::info;

use crate::cli::AgentArgs;
use crate::error::{AppError, AppResult};
use crate::serve::serve;

/// Build identifier injected at compile time, `dev` otherwise.
const BUILD_SHA: &str = match option_env!("DROPSHIP_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Entry point for the agent boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, or the controller connection cannot be
/// established, or if the request stream fails.
pub async fn run_agent(args: AgentArgs) -> AppResult<()> {
    let config = dropship_config::load(&args.config)
        .map_err(|err| AppError::config("config.load", err))?;

    let logging = logging_config(&args, &config);
    dropship_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    info!(config = %args.config.display(), "Dropship agent bootstrap starting");

    let source = connect(config.ssh.clone()).await?;
    let manager = UploadManager::new(
        Arc::new(LocalFileSystem::new()),
        Arc::new(source),
        Arc::new(config.upload),
    );

    let summary = serve(
        manager,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    info!(
        succeeded = summary.succeeded,
        ignored = summary.ignored,
        failed = summary.failed,
        "Dropship agent shutting down"
    );
    Ok(())
}

fn logging_config<'a>(args: &'a AgentArgs, config: &'a AgentConfig) -> LoggingConfig<'a> {
    LoggingConfig {
        level: args
            .log_level
            .as_deref()
            .unwrap_or(config.logging.level.as_str()),
        format: args.log_format.map_or_else(
            || LogFormat::from_config(config.logging.format.as_deref()),
            LogFormat::from,
        ),
        build_sha: BUILD_SHA,
    }
}

async fn connect(settings: SshSettings) -> AppResult<SftpSource> {
    tokio::task::spawn_blocking(move || SftpSource::connect(&settings))
        .await
        .map_err(|err| AppError::worker("ssh.connect", err))?
        .map_err(|err| AppError::remote("ssh.connect", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::LogFormatArg;
    use std::path::PathBuf;

    fn args(level: Option<&str>, format: Option<LogFormatArg>) -> AgentArgs {
        AgentArgs {
            config: PathBuf::from("/etc/dropship/agent.json"),
            log_level: level.map(str::to_string),
            log_format: format,
        }
    }

    #[test]
    fn flags_override_configured_logging() {
        let mut config = AgentConfig::default();
        config.logging.level = "warn".to_string();
        config.logging.format = Some("pretty".to_string());

        let cli = args(Some("debug"), Some(LogFormatArg::Json));
        let logging = logging_config(&cli, &config);
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);

        let bare = args(None, None);
        let logging = logging_config(&bare, &config);
        assert_eq!(logging.level, "warn");
        assert_eq!(logging.format, LogFormat::Pretty);
        assert_eq!(logging.build_sha, BUILD_SHA);
    }

    #[tokio::test]
    async fn missing_config_fails_before_logging() {
        let cli = AgentArgs {
            config: PathBuf::from("/definitely/missing/agent.json"),
            log_level: None,
            log_format: None,
        };
        let err = run_agent(cli).await.err();
        assert!(matches!(
            err,
            Some(AppError::Config {
                operation: "config.load",
                ..
            })
        ));
    }
}
