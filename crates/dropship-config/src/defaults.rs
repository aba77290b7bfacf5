//! Default values applied when the configuration document omits a setting.
//!
//! # Design
//! - Keep defaults in one place so documentation, loader, and tests agree.
//! - The deny-list protects system binaries and boot/kernel state by default.

/// Staging directory for in-flight uploads.
pub(crate) const UPLOAD_DIR: &str = "/var/lib/dropship/uploads";
/// Destinations that may never be written by a push.
pub(crate) const FILE_PUSH_DENY: &[&str] = &[
    "/bin/**",
    "/sbin/**",
    "/boot/**",
    "/usr/bin/**",
    "/usr/sbin/**",
    "/dev/**",
    "/lib*/**",
    "/run/**",
];
/// SSH user used when none is configured.
pub(crate) const SSH_USER: &str = "dropship";
/// Tracing level used when none is configured.
pub(crate) const LOG_LEVEL: &str = "info";
