//! Response returned to the controller after an upload is handled.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Separator placed between message fragments.
pub const MESSAGE_DELIMITER: &str = ". ";

/// Terminal state of a handled upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// The file was written to its destination.
    Success,
    /// The existing destination was left untouched.
    Ignored,
}

impl UploadStatus {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Ignored => "ignored",
        }
    }
}

/// Outcome of [`crate::UploadManager::handle_upload_request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Identifier copied from the request.
    pub id: String,
    /// Destination path the request targeted.
    pub filepath: PathBuf,
    /// Bytes written; zero when nothing was written.
    pub size_bytes: u64,
    /// Whether the destination was written or ignored.
    pub status: UploadStatus,
    /// Human readable outcome, possibly several fragments joined by [`MESSAGE_DELIMITER`].
    pub message: String,
}

impl UploadResponse {
    pub(crate) fn success(
        id: String,
        filepath: PathBuf,
        size_bytes: u64,
        fragments: &[String],
    ) -> Self {
        Self {
            id,
            filepath,
            size_bytes,
            status: UploadStatus::Success,
            message: fragments.join(MESSAGE_DELIMITER),
        }
    }

    pub(crate) fn ignored(id: String, filepath: PathBuf, message: String) -> Self {
        Self {
            id,
            filepath,
            size_bytes: 0,
            status: UploadStatus::Ignored,
            message,
        }
    }

    /// Individual message fragments in the order they were produced.
    pub fn message_fragments(&self) -> impl Iterator<Item = &str> {
        self.message.split(MESSAGE_DELIMITER)
    }
}
