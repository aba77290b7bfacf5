//! # Design
//!
//! - Provide structured, constant-message errors for the upload pipeline.
//! - Capture operation context (paths, fields, digests) so failures are reproducible in tests.
//! - Classify every variant so callers can tell fatal failures from metadata warnings.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::digest::ContentDigest;
use crate::remote::RemoteError;

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors produced while decoding, staging, or installing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The raw payload was not a valid upload document.
    #[error("upload payload could not be decoded")]
    Decode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// A decoded request field failed validation.
    #[error("upload request invalid")]
    InvalidRequest {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The destination matched an entry of the configured deny-list.
    #[error("upload destination denied")]
    DeniedDestination {
        /// Destination path that was rejected.
        path: PathBuf,
        /// Deny pattern that matched.
        pattern: String,
    },
    /// A deny-list entry could not be compiled.
    #[error("upload deny pattern invalid")]
    DenyPattern {
        /// Pattern that failed to compile.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// The remote source could not be opened.
    #[error("remote source unavailable")]
    Transport {
        /// Operation that triggered the transport failure.
        operation: &'static str,
        /// Remote path involved in the failure.
        path: PathBuf,
        /// Underlying transport error.
        source: RemoteError,
    },
    /// The staged bytes did not hash to the declared digest.
    #[error("upload checksum mismatch")]
    ChecksumMismatch {
        /// Staging artifact that was discarded.
        path: PathBuf,
        /// Digest declared by the controller.
        expected: ContentDigest,
        /// Digest measured over the staged bytes.
        actual: ContentDigest,
    },
    /// IO failures while interacting with the local filesystem.
    #[error("upload io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Nix syscall failures.
    #[cfg(unix)]
    #[error("upload nix failure")]
    Nix {
        /// Operation that triggered the nix failure.
        operation: &'static str,
        /// Path involved in the nix failure.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// User lookup failed when resolving ownership.
    #[cfg(unix)]
    #[error("upload user lookup failed")]
    UserLookup {
        /// Username that failed lookup.
        user: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Group lookup failed when resolving ownership.
    #[cfg(unix)]
    #[error("upload group lookup failed")]
    GroupLookup {
        /// Group name that failed lookup.
        group: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// An owner or group name did not resolve to an account.
    #[error("upload account not found")]
    UnknownAccount {
        /// Which account kind was looked up (`owner` or `group`).
        field: &'static str,
        /// Name that failed to resolve.
        value: String,
    },
    /// Unsupported operation on this platform.
    #[error("upload unsupported operation")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
    },
}

/// Coarse classification of [`UploadError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or deny-listed request; nothing was touched.
    Validation,
    /// The remote source failed to open.
    Transport,
    /// Transferred bytes did not match the declared digest.
    ChecksumMismatch,
    /// Directory/file creation, deletion, or rename failed.
    Filesystem,
    /// Mode or ownership could not be inspected or applied.
    Metadata,
}

impl ErrorKind {
    /// Stable label used in logs and agent output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transport => "transport",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::Filesystem => "filesystem",
            Self::Metadata => "metadata",
        }
    }
}

impl UploadError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. }
            | Self::InvalidRequest { .. }
            | Self::DeniedDestination { .. }
            | Self::DenyPattern { .. } => ErrorKind::Validation,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Io { .. } => ErrorKind::Filesystem,
            #[cfg(unix)]
            Self::Nix { .. } | Self::UserLookup { .. } | Self::GroupLookup { .. } => {
                ErrorKind::Metadata
            }
            Self::UnknownAccount { .. } | Self::Unsupported { .. } => ErrorKind::Metadata,
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[cfg(unix)]
    pub(crate) fn nix(operation: &'static str, path: impl Into<PathBuf>, source: nix::Error) -> Self {
        Self::Nix {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transport(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: RemoteError,
    ) -> Self {
        Self::Transport {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: Option<&str>) -> Self {
        Self::InvalidRequest {
            field,
            reason,
            value: value.map(str::to_string),
        }
    }

    /// Render the error with its context and the chain of sources.
    #[must_use]
    pub fn detail(&self) -> String {
        let context = match self {
            Self::Decode { .. } | Self::DenyPattern { .. } => None,
            Self::InvalidRequest {
                field,
                reason,
                value,
            } => Some(value.as_ref().map_or_else(
                || format!("{field} {reason}"),
                |value| format!("{field} {reason} ({value})"),
            )),
            Self::DeniedDestination { path, pattern } => Some(format!(
                "{} matches deny pattern {pattern}",
                path.display()
            )),
            Self::Transport {
                operation, path, ..
            }
            | Self::Io {
                operation, path, ..
            } => Some(format!("{operation} {}", path.display())),
            #[cfg(unix)]
            Self::Nix {
                operation, path, ..
            } => Some(format!("{operation} {}", path.display())),
            Self::ChecksumMismatch {
                expected, actual, ..
            } => Some(format!(
                "checksum from server {expected} doesn't equal the calculated checksum {actual}"
            )),
            #[cfg(unix)]
            Self::UserLookup { user, .. } => Some(format!("owner {user}")),
            #[cfg(unix)]
            Self::GroupLookup { group, .. } => Some(format!("group {group}")),
            Self::UnknownAccount { field, value } => Some(format!("{field} {value}")),
            Self::Unsupported { operation } => Some((*operation).to_string()),
        };

        let mut rendered = self.to_string();
        if let Some(context) = context {
            rendered.push_str(" (");
            rendered.push_str(&context);
            rendered.push(')');
        }
        if let Some(source) = self.source() {
            rendered.push_str(": ");
            rendered.push_str(&error_chain(source));
        }
        rendered
    }
}

/// Render an error followed by each of its sources, separated by `": "`.
#[must_use]
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        rendered.push_str(": ");
        rendered.push_str(&source.to_string());
        current = source.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classifies_fatal_and_metadata_variants() {
        let io_err = UploadError::io("rename", "/tmp/a", io::Error::other("io"));
        assert_eq!(io_err.kind(), ErrorKind::Filesystem);

        let invalid = UploadError::invalid("id", "empty", None);
        assert_eq!(invalid.kind(), ErrorKind::Validation);

        let unknown = UploadError::UnknownAccount {
            field: "owner",
            value: "nobody-here".to_string(),
        };
        assert_eq!(unknown.kind(), ErrorKind::Metadata);

        let mismatch = UploadError::ChecksumMismatch {
            path: PathBuf::from("/tmp/stage"),
            expected: ContentDigest::of(b"a"),
            actual: ContentDigest::of(b"b"),
        };
        assert_eq!(mismatch.kind(), ErrorKind::ChecksumMismatch);
        assert_eq!(mismatch.kind().as_str(), "checksum_mismatch");
    }

    #[test]
    fn detail_includes_context_and_sources() {
        let err = UploadError::io(
            "install.rename",
            "/srv/data/file",
            io::Error::other("disk on fire"),
        );
        let detail = err.detail();
        assert!(detail.starts_with("upload io failure"));
        assert!(detail.contains("install.rename /srv/data/file"));
        assert!(detail.ends_with("disk on fire"));
    }

    #[test]
    fn detail_reports_both_digests_on_mismatch() {
        let expected = ContentDigest::of(b"hello");
        let actual = ContentDigest::of(b"world");
        let err = UploadError::ChecksumMismatch {
            path: PathBuf::from("/tmp/stage"),
            expected,
            actual,
        };
        let detail = err.detail();
        assert!(detail.contains(&expected.to_string()));
        assert!(detail.contains(&actual.to_string()));
    }
}
