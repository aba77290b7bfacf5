//! Validation rules applied to a loaded [`AgentConfig`].

use std::net::SocketAddr;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AgentConfig, LoggingSettings, SshSettings, UploadOptions};

const LOG_FORMATS: [&str; 2] = ["json", "pretty"];

impl AgentConfig {
    /// Check every section, returning the first invalid field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] describing the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_upload(&self.upload)?;
        validate_ssh(&self.ssh)?;
        validate_logging(&self.logging)
    }
}

fn validate_upload(upload: &UploadOptions) -> ConfigResult<()> {
    if !upload.upload_dir.is_absolute() {
        return Err(ConfigError::invalid(
            "upload",
            "upload_dir",
            upload.upload_dir.to_str(),
            "not_absolute",
        ));
    }
    if let Some(pattern) = upload
        .file_push_deny
        .iter()
        .find(|pattern| pattern.trim().is_empty())
    {
        return Err(ConfigError::invalid(
            "upload",
            "file_push_deny",
            Some(pattern),
            "empty_pattern",
        ));
    }
    Ok(())
}

fn validate_ssh(ssh: &SshSettings) -> ConfigResult<()> {
    let address = ssh.address.trim();
    if address.is_empty() {
        return Err(ConfigError::invalid("ssh", "address", None, "empty"));
    }
    if !has_port(address) {
        return Err(ConfigError::invalid(
            "ssh",
            "address",
            Some(address),
            "missing_port",
        ));
    }
    if ssh.user.trim().is_empty() {
        return Err(ConfigError::invalid("ssh", "user", None, "empty"));
    }
    if let Some(identity) = ssh.identity_file.as_deref()
        && !identity.is_absolute()
    {
        return Err(ConfigError::invalid(
            "ssh",
            "identity_file",
            identity.to_str(),
            "not_absolute",
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingSettings) -> ConfigResult<()> {
    if logging.level.trim().is_empty() {
        return Err(ConfigError::invalid("logging", "level", None, "empty"));
    }
    if let Some(format) = logging.format.as_deref()
        && !LOG_FORMATS.contains(&format)
    {
        return Err(ConfigError::invalid(
            "logging",
            "format",
            Some(format),
            "unsupported_format",
        ));
    }
    Ok(())
}

// Literal `ip:port` forms parse without touching the resolver; hostnames only need a port.
fn has_port(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid() -> AgentConfig {
        let mut config = AgentConfig::default();
        config.ssh.address = "controller.internal:22".to_string();
        config
    }

    fn reason(result: ConfigResult<()>) -> Option<(&'static str, &'static str, &'static str)> {
        match result {
            Err(ConfigError::InvalidField {
                section,
                field,
                reason,
                ..
            }) => Some((section, field, reason)),
            _ => None,
        }
    }

    #[test]
    fn defaults_with_address_are_valid() -> ConfigResult<()> {
        valid().validate()
    }

    #[test]
    fn rejects_relative_upload_dir() {
        let mut config = valid();
        config.upload.upload_dir = PathBuf::from("uploads");
        assert_eq!(
            reason(config.validate()),
            Some(("upload", "upload_dir", "not_absolute"))
        );
    }

    #[test]
    fn rejects_blank_deny_pattern() {
        let mut config = valid();
        config.upload.file_push_deny.push("  ".to_string());
        assert_eq!(
            reason(config.validate()),
            Some(("upload", "file_push_deny", "empty_pattern"))
        );
    }

    #[test]
    fn rejects_missing_or_portless_address() {
        let mut config = AgentConfig::default();
        assert_eq!(reason(config.validate()), Some(("ssh", "address", "empty")));
        config.ssh.address = "controller.internal".to_string();
        assert_eq!(
            reason(config.validate()),
            Some(("ssh", "address", "missing_port"))
        );
        config.ssh.address = "[::1]:2222".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_relative_identity_and_unknown_format() {
        let mut config = valid();
        config.ssh.identity_file = Some(PathBuf::from("id_ed25519"));
        assert_eq!(
            reason(config.validate()),
            Some(("ssh", "identity_file", "not_absolute"))
        );

        let mut config = valid();
        config.logging.format = Some("xml".to_string());
        assert_eq!(
            reason(config.validate()),
            Some(("logging", "format", "unsupported_format"))
        );
    }
}
