#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! File and environment backed configuration for the Dropship agent.
//!
//! Layout: `model.rs` (typed sections), `defaults.rs` (fallback values), `loader.rs`
//! (file + environment layering), `validate.rs` (field checks).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_LOG_LEVEL, ENV_SSH_ADDRESS, ENV_SSH_USER, ENV_UPLOAD_DIR, load, load_with};
pub use model::{AgentConfig, LoggingSettings, SshSettings, UploadOptions};
