//! Newline-delimited request loop.
//!
//! # Design
//! - Each input line is one upload payload; blank lines are skipped.
//! - Uploads run on blocking workers so slow transfers never stall intake.
//! - Every payload produces exactly one output line, in completion order: the upload
//!   response on success, otherwise an error line carrying the detail and kind.

use dropship_upload::{UploadManager, UploadResponse, UploadStatus};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::{AppError, AppResult};

/// Counters reported once the input stream closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// Uploads that wrote their destination.
    pub succeeded: usize,
    /// Uploads that left the destination untouched.
    pub ignored: usize,
    /// Uploads that failed.
    pub failed: usize,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Reply {
    Response(UploadResponse),
    Failure {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        error: String,
        kind: &'static str,
    },
}

impl ServeSummary {
    fn record(&mut self, reply: &Reply) {
        match reply {
            Reply::Response(response) => match response.status {
                UploadStatus::Success => self.succeeded += 1,
                UploadStatus::Ignored => self.ignored += 1,
            },
            Reply::Failure { .. } => self.failed += 1,
        }
    }
}

/// Serve payloads read from `input`, writing one JSON line per payload to `output`.
///
/// Returns once `input` is exhausted and every in-flight upload has been answered.
///
/// # Errors
///
/// Returns an error when reading input or writing output fails, or when a worker panics.
/// Individual upload failures are reported on `output` and never abort the loop.
pub async fn serve<R, W>(manager: UploadManager, input: R, mut output: W) -> AppResult<ServeSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut workers = JoinSet::new();
    let mut summary = ServeSummary::default();
    let mut reading = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if reading => {
                match line.map_err(|source| AppError::io("requests.read", source))? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let manager = manager.clone();
                        workers.spawn_blocking(move || handle_line(&manager, line.as_bytes()));
                    }
                    None => reading = false,
                }
            }
            Some(joined) = workers.join_next(), if !workers.is_empty() => {
                let reply = joined.map_err(|source| AppError::worker("upload.join", source))?;
                summary.record(&reply);
                write_reply(&mut output, &reply).await?;
            }
            else => break,
        }
    }

    output
        .flush()
        .await
        .map_err(|source| AppError::io("responses.flush", source))?;
    info!(
        succeeded = summary.succeeded,
        ignored = summary.ignored,
        failed = summary.failed,
        "request stream closed"
    );
    Ok(summary)
}

fn handle_line(manager: &UploadManager, raw: &[u8]) -> Reply {
    match manager.handle_upload_request(raw) {
        Ok(response) => Reply::Response(response),
        Err(err) => {
            let id = payload_id(raw);
            error!(
                upload_id = id.as_deref().unwrap_or_default(),
                kind = err.kind().as_str(),
                error = %err.detail(),
                "upload failed"
            );
            Reply::Failure {
                id,
                error: err.detail(),
                kind: err.kind().as_str(),
            }
        }
    }
}

// Best effort: the payload may be too malformed to carry an id at all.
fn payload_id(raw: &[u8]) -> Option<String> {
    let document: serde_json::Value = serde_json::from_slice(raw).ok()?;
    document.get("id")?.as_str().map(str::to_string)
}

async fn write_reply<W>(output: &mut W, reply: &Reply) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(reply).map_err(|source| AppError::Encode { source })?;
    line.push(b'\n');
    output
        .write_all(&line)
        .await
        .map_err(|source| AppError::io("responses.write", source))
}
