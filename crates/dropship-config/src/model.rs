//! Typed configuration sections for the Dropship agent.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Complete agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Upload staging and deny-list settings.
    pub upload: UploadOptions,
    /// Connection to the controller.
    pub ssh: SshSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Settings consumed by the upload engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadOptions {
    /// Directory that holds staging artifacts; must live on the destination volume for
    /// installs to be atomic.
    pub upload_dir: PathBuf,
    /// Glob patterns of destination paths that pushes may never write.
    pub file_push_deny: Vec<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(defaults::UPLOAD_DIR),
            file_push_deny: defaults::FILE_PUSH_DENY
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// How the agent reaches the controller's file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshSettings {
    /// `host:port` of the controller's SSH endpoint.
    pub address: String,
    /// Account used for authentication.
    pub user: String,
    /// Private key file; when unset the running ssh-agent is used.
    pub identity_file: Option<PathBuf>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            user: defaults::SSH_USER.to_string(),
            identity_file: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Tracing filter directive (for example `info` or `dropship_upload=debug`).
    pub level: String,
    /// `json` or `pretty`; inferred from the build profile when unset.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
