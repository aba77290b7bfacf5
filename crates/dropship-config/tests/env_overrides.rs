//! Environment overrides layered through [`dropship_config::load_with`].

use std::collections::HashMap;
use std::path::PathBuf;

use dropship_config::{ConfigError, ENV_SSH_ADDRESS, ENV_SSH_USER, ENV_UPLOAD_DIR, load_with};
use dropship_test_support::fixtures::{temp_dir, write_file};

fn environment(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn environment_supplies_missing_address() -> anyhow::Result<()> {
    let dir = temp_dir()?;
    let path = write_file(dir.path(), "agent.json", b"{}")?;

    let config = load_with(
        &path,
        environment(&[
            (ENV_SSH_ADDRESS, "controller:2222"),
            (ENV_UPLOAD_DIR, "/srv/dropship"),
        ]),
    )?;
    assert_eq!(config.ssh.address, "controller:2222");
    assert_eq!(config.upload.upload_dir, PathBuf::from("/srv/dropship"));
    Ok(())
}

#[test]
fn blank_override_keeps_file_value() -> anyhow::Result<()> {
    let dir = temp_dir()?;
    let path = write_file(
        dir.path(),
        "agent.json",
        br#"{"ssh": {"address": "ctl:22", "user": "deploy"}}"#,
    )?;

    let config = load_with(&path, environment(&[(ENV_SSH_USER, "   ")]))?;
    assert_eq!(config.ssh.user, "deploy");
    assert_eq!(config.ssh.address, "ctl:22");
    Ok(())
}

#[test]
fn invalid_override_fails_validation() -> anyhow::Result<()> {
    let dir = temp_dir()?;
    let path = write_file(dir.path(), "agent.json", br#"{"ssh": {"address": "ctl:22"}}"#)?;

    let err = load_with(&path, environment(&[(ENV_UPLOAD_DIR, "relative/stage")])).err();
    assert!(matches!(
        err,
        Some(ConfigError::InvalidField {
            section: "upload",
            field: "upload_dir",
            reason: "not_absolute",
            ..
        })
    ));
    Ok(())
}
