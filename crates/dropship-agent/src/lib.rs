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

//! Dropship agent bootstrap wiring.
//!
//! Layout: `cli.rs` (arguments), `bootstrap.rs` (config, logging, and capability wiring),
//! `serve.rs` (newline-delimited request loop), `error.rs` (application errors).

pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod serve;

pub use bootstrap::run_agent;
pub use cli::{AgentArgs, LogFormatArg};
pub use error::{AppError, AppResult};
pub use serve::{ServeSummary, serve};
