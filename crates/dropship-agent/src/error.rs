//! # Design
//!
//! - Centralize agent-level errors for bootstrap and the serve loop.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;

use thiserror::Error;

/// Result alias for agent operations.
pub type AppResult<T> = Result<T, AppError>;

/// Agent-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or validated.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: dropship_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: dropship_telemetry::TelemetryError,
    },
    /// The controller could not be reached.
    #[error("remote connection failed")]
    Remote {
        /// Operation identifier.
        operation: &'static str,
        /// Source remote error.
        source: dropship_upload::RemoteError,
    },
    /// Reading requests or writing responses failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// A response line could not be encoded.
    #[error("response encoding failed")]
    Encode {
        /// Source serde error.
        source: serde_json::Error,
    },
    /// A blocking worker panicked or was cancelled.
    #[error("worker task failed")]
    Worker {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: dropship_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: dropship_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn remote(
        operation: &'static str,
        source: dropship_upload::RemoteError,
    ) -> Self {
        Self::Remote { operation, source }
    }

    pub(crate) const fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }

    pub(crate) const fn worker(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Worker { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load",
            dropship_config::ConfigError::InvalidField {
                section: "ssh",
                field: "address",
                value: None,
                reason: "empty",
            },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "config.load",
                ..
            }
        ));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let remote = AppError::remote(
            "ssh.connect",
            dropship_upload::RemoteError::Io {
                operation: "tcp.connect",
                source: io::Error::other("refused"),
            },
        );
        assert!(matches!(remote, AppError::Remote { .. }));

        let io_err = AppError::io("stdin.read", io::Error::other("closed"));
        assert!(matches!(io_err, AppError::Io { .. }));
    }
}
