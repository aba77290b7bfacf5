//! Upload request decoding and validation.
//!
//! # Design
//! - Decode the controller's JSON document into a wire struct, then validate into an
//!   immutable [`UploadRequest`] so the manager never sees unchecked input.
//! - Zero modes and blank owners/groups mean "unspecified" and become `None`.
//! - Deny-list globs are compiled per validation; an invalid pattern rejects the request.

use std::path::PathBuf;

use base64::{Engine as _, engine::general_purpose};
use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::{UploadError, UploadResult};
use crate::fs::MODE_MASK;

/// Upload document as sent by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPayload {
    /// Controller-assigned identifier echoed in the response.
    pub id: String,
    /// Path of the file on the controller side.
    pub source_file_path: String,
    /// Absolute local path the file should be installed at.
    pub destination_path: String,
    /// Target permission bits; `0` leaves them unspecified.
    pub destination_file_mode: u32,
    /// Target owner (name or uid); empty leaves it unspecified.
    pub destination_file_owner: String,
    /// Target group (name or gid); empty leaves it unspecified.
    pub destination_file_group: String,
    /// Base64 encoded MD5 of the file content.
    pub md5_checksum: String,
    /// Overwrite unconditionally.
    pub force: bool,
    /// Overwrite only when the existing destination diverges.
    pub sync: bool,
}

/// Validated upload request consumed by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Controller-assigned identifier.
    pub id: String,
    /// Remote source path.
    pub source: PathBuf,
    /// Local destination path.
    pub destination: PathBuf,
    /// Target permission bits.
    pub mode: Option<u32>,
    /// Target owner.
    pub owner: Option<String>,
    /// Target group.
    pub group: Option<String>,
    /// Expected digest of the transferred bytes.
    pub checksum: ContentDigest,
    /// Overwrite unconditionally.
    pub force: bool,
    /// Overwrite when the existing destination diverges.
    pub sync: bool,
}

impl UploadRequest {
    /// Decode a raw payload and validate it against `deny_patterns`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed payloads, invalid fields, invalid deny
    /// patterns, or a deny-listed destination.
    pub fn from_payload(raw: &[u8], deny_patterns: &[String]) -> UploadResult<Self> {
        let payload: UploadPayload =
            serde_json::from_slice(raw).map_err(|source| UploadError::Decode { source })?;
        let request = Self::try_from(payload)?;
        request.ensure_destination_allowed(deny_patterns)?;
        Ok(request)
    }

    /// Reject the request when its destination matches any deny pattern.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::DeniedDestination`] on a match or
    /// [`UploadError::DenyPattern`] for an uncompilable pattern.
    pub fn ensure_destination_allowed(&self, deny_patterns: &[String]) -> UploadResult<()> {
        for pattern in deny_patterns {
            let matcher = Glob::new(pattern)
                .map_err(|source| UploadError::DenyPattern {
                    pattern: pattern.clone(),
                    source,
                })?
                .compile_matcher();
            if matcher.is_match(&self.destination) {
                return Err(UploadError::DeniedDestination {
                    path: self.destination.clone(),
                    pattern: pattern.clone(),
                });
            }
        }
        Ok(())
    }

    /// Base name of the remote source.
    #[must_use]
    pub fn source_file_name(&self) -> &str {
        self.source
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Whether either owner or group was requested.
    #[must_use]
    pub const fn wants_ownership(&self) -> bool {
        self.owner.is_some() || self.group.is_some()
    }
}

impl TryFrom<UploadPayload> for UploadRequest {
    type Error = UploadError;

    fn try_from(payload: UploadPayload) -> UploadResult<Self> {
        let id = required("id", &payload.id)?;
        let source = PathBuf::from(required("source_file_path", &payload.source_file_path)?);
        if source.file_name().and_then(|name| name.to_str()).is_none() {
            return Err(UploadError::invalid(
                "source_file_path",
                "missing_file_name",
                Some(&payload.source_file_path),
            ));
        }

        let destination = PathBuf::from(required("destination_path", &payload.destination_path)?);
        if !destination.is_absolute() {
            return Err(UploadError::invalid(
                "destination_path",
                "not_absolute",
                Some(&payload.destination_path),
            ));
        }
        if destination.file_name().is_none() {
            return Err(UploadError::invalid(
                "destination_path",
                "missing_file_name",
                Some(&payload.destination_path),
            ));
        }

        if payload.destination_file_mode & !MODE_MASK != 0 {
            return Err(UploadError::invalid(
                "destination_file_mode",
                "out_of_range",
                Some(&format!("{:o}", payload.destination_file_mode)),
            ));
        }

        let checksum = decode_checksum(&payload.md5_checksum)?;

        Ok(Self {
            id: id.to_string(),
            source,
            destination,
            mode: (payload.destination_file_mode != 0).then_some(payload.destination_file_mode),
            owner: optional(&payload.destination_file_owner),
            group: optional(&payload.destination_file_group),
            checksum,
            force: payload.force,
            sync: payload.sync,
        })
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> UploadResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(UploadError::invalid(field, "empty", None));
    }
    Ok(trimmed)
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn decode_checksum(encoded: &str) -> UploadResult<ContentDigest> {
    let encoded = required("md5_checksum", encoded)?;
    let raw = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| UploadError::invalid("md5_checksum", "invalid_base64", Some(encoded)))?;
    ContentDigest::from_slice(&raw)
        .ok_or_else(|| UploadError::invalid("md5_checksum", "invalid_length", Some(encoded)))
}

/// Encode a digest the way controllers place it in [`UploadPayload::md5_checksum`].
#[must_use]
pub fn encode_checksum(digest: &ContentDigest) -> String {
    general_purpose::STANDARD.encode(digest.as_bytes())
}
