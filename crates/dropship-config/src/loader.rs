//! Loading configuration from disk and the process environment.
//!
//! # Design
//! - The JSON file is the base layer; environment variables override individual fields.
//! - Environment lookup is injectable so overrides can be exercised without mutating
//!   process state.
//! - Validation runs last, on the merged document.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::AgentConfig;

/// Overrides `upload.upload_dir`.
pub const ENV_UPLOAD_DIR: &str = "DROPSHIP_UPLOAD_DIR";
/// Overrides `ssh.address`.
pub const ENV_SSH_ADDRESS: &str = "DROPSHIP_SSH_ADDRESS";
/// Overrides `ssh.user`.
pub const ENV_SSH_USER: &str = "DROPSHIP_SSH_USER";
/// Overrides `logging.level`.
pub const ENV_LOG_LEVEL: &str = "DROPSHIP_LOG_LEVEL";

/// Load, override from the process environment, and validate the configuration at `path`.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or when the merged
/// configuration fails validation.
pub fn load(path: &Path) -> ConfigResult<AgentConfig> {
    load_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load`] with a caller-supplied environment lookup.
///
/// # Errors
///
/// See [`load`].
pub fn load_with<F>(path: &Path, lookup: F) -> ConfigResult<AgentConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = read_file(path)?;
    config.apply_overrides(lookup);
    config.validate()?;
    info!(
        path = %path.display(),
        upload_dir = %config.upload.upload_dir.display(),
        deny_patterns = config.upload.file_push_deny.len(),
        "configuration loaded"
    );
    Ok(config)
}

fn read_file(path: &Path) -> ConfigResult<AgentConfig> {
    let raw = fs::read(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl AgentConfig {
    /// Apply environment overrides resolved through `lookup`.
    ///
    /// Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .inspect(|_| debug!(variable = key, "environment override applied"))
        };

        if let Some(dir) = get(ENV_UPLOAD_DIR) {
            self.upload.upload_dir = PathBuf::from(dir);
        }
        if let Some(address) = get(ENV_SSH_ADDRESS) {
            self.ssh.address = address;
        }
        if let Some(user) = get(ENV_SSH_USER) {
            self.ssh.user = user;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use dropship_test_support::fixtures::{temp_dir, write_file};

    #[test]
    fn overrides_replace_file_values() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let path = write_file(
            dir.path(),
            "agent.json",
            br#"{"ssh": {"address": "ctl:22", "user": "file-user"}}"#,
        )?;
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SSH_USER, "env-user"),
            (ENV_UPLOAD_DIR, "/srv/stage"),
            (ENV_LOG_LEVEL, "  "),
        ]);

        let config = load_with(&path, |key| env.get(key).map(ToString::to_string))?;
        assert_eq!(config.ssh.user, "env-user");
        assert_eq!(config.ssh.address, "ctl:22");
        assert_eq!(config.upload.upload_dir, PathBuf::from("/srv/stage"));
        assert_eq!(config.logging.level, "info");
        Ok(())
    }

    #[test]
    fn missing_file_is_io_error() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let err = load_with(&dir.path().join("absent.json"), |_| None).err();
        assert!(matches!(
            err,
            Some(ConfigError::Io {
                operation: "config.read",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn malformed_file_is_parse_error() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let path = write_file(dir.path(), "agent.json", b"{ upload: ")?;
        assert!(matches!(
            load_with(&path, |_| None).err(),
            Some(ConfigError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn merged_config_is_validated() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let path = write_file(dir.path(), "agent.json", b"{}")?;
        assert!(matches!(
            load_with(&path, |_| None).err(),
            Some(ConfigError::InvalidField {
                field: "address",
                ..
            })
        ));
        Ok(())
    }
}
