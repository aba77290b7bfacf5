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
#![allow(clippy::multiple_crate_versions)]

//! Binary entrypoint that loads configuration, connects to the controller, and serves
//! upload requests from stdin.

use clap::Parser;
use dropship_agent::{AgentArgs, AppResult, run_agent};

/// Bootstraps the agent and blocks until stdin closes.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_agent(AgentArgs::parse()).await
}
