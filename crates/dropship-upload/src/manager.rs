//! Upload orchestration: decision policy, staging, verification, metadata, install.
//!
//! # Design
//! - Keep the pipeline strictly linear per request: validate, lock, decide, then
//!   stage, verify, apply metadata, and install.
//! - The destination is touched only after the staged bytes hash to the declared digest,
//!   and only through delete-then-rename of the fully written staging artifact.
//! - Mode/ownership failures are downgraded into response message fragments; every other
//!   failure aborts the request without internal retries.
//! - Staging names carry the request identifier and each destination is serialised through
//!   [`DestinationLocks`], so concurrent uploads never share a staging file or interleave
//!   installs into the same path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dropship_config::UploadOptions;
use tracing::{debug, error, info, info_span, warn};

use crate::digest::{ContentDigest, digest_reader};
use crate::error::{UploadError, UploadResult, error_chain};
use crate::fs::FileSystem;
use crate::locks::DestinationLocks;
use crate::remote::RemoteSource;
use crate::request::UploadRequest;
use crate::response::UploadResponse;

/// Directory mode used when a request carries no target mode.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

const OWNER_DIR_BITS: u32 = 0o700;

/// Read-only configuration consumed by the upload manager.
pub trait OptionsProvider: Send + Sync {
    /// Directory holding staging artifacts; created on demand.
    fn upload_dir(&self) -> &Path;
    /// Glob patterns of destinations that must never be written.
    fn file_push_deny(&self) -> &[String];
}

impl OptionsProvider for UploadOptions {
    fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn file_push_deny(&self) -> &[String] {
        &self.file_push_deny
    }
}

/// Outcome of the write-vs-ignore policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Stage and install the remote file.
    Write(WriteReason),
    /// Leave the existing destination untouched.
    Ignore,
}

/// Why the destination is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReason {
    /// Nothing exists at the destination yet.
    DestinationMissing,
    /// The request demanded an unconditional overwrite.
    Forced,
    /// A sync request found the destination out of date.
    Diverged(Divergence),
}

impl WriteReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::DestinationMissing => "destination_missing",
            Self::Forced => "forced",
            Self::Diverged(Divergence::Content) => "diverged_content",
            Self::Diverged(Divergence::Mode) => "diverged_mode",
            Self::Diverged(Divergence::Ownership) => "diverged_ownership",
        }
    }
}

/// First attribute found to differ during a sync check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    /// Content digest differs.
    Content,
    /// Permission bits differ.
    Mode,
    /// Owner or group differs.
    Ownership,
}

struct StagedFile {
    path: PathBuf,
    bytes: u64,
}

/// Materialises files pushed by the controller onto local disk.
#[derive(Clone)]
pub struct UploadManager {
    fs: Arc<dyn FileSystem>,
    remote: Arc<dyn RemoteSource>,
    options: Arc<dyn OptionsProvider>,
    locks: Arc<DestinationLocks>,
}

impl UploadManager {
    /// Construct a manager over the given capabilities.
    #[must_use]
    pub fn new(
        fs: Arc<dyn FileSystem>,
        remote: Arc<dyn RemoteSource>,
        options: Arc<dyn OptionsProvider>,
    ) -> Self {
        Self {
            fs,
            remote,
            options,
            locks: Arc::new(DestinationLocks::new()),
        }
    }

    /// Decode, validate, and handle a raw upload payload.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed or deny-listed payloads, and any fatal
    /// error raised by [`UploadManager::handle`].
    pub fn handle_upload_request(&self, payload: &[u8]) -> UploadResult<UploadResponse> {
        debug!(payload = %String::from_utf8_lossy(payload), "got upload request");
        let request = UploadRequest::from_payload(payload, self.options.file_push_deny())
            .inspect_err(|err| warn!(error = %err.detail(), "rejected upload request"))?;
        self.handle(request)
    }

    /// Handle an already validated request.
    ///
    /// # Errors
    ///
    /// Returns transport, checksum-mismatch, or filesystem errors; metadata failures are
    /// reported inside the successful response message instead.
    pub fn handle(&self, request: UploadRequest) -> UploadResult<UploadResponse> {
        let span = info_span!(
            "upload",
            upload_id = %request.id,
            destination = %request.destination.display()
        );
        let _entered = span.enter();
        let _guard = self.locks.acquire(&request.destination);

        match self.decide(&request)? {
            Decision::Write(reason) => {
                debug!(reason = reason.as_str(), "destination will be written");
                self.write(request)
            }
            Decision::Ignore => {
                let message = format!(
                    "file {} already exists, should not be synched or overwritten with force",
                    request.destination.display()
                );
                info!(status = "ignored", "{message}");
                Ok(UploadResponse::ignored(
                    request.id,
                    request.destination,
                    message,
                ))
            }
        }
    }

    /// Evaluate the write-vs-ignore policy for `request` without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination cannot be inspected.
    pub fn decide(&self, request: &UploadRequest) -> UploadResult<Decision> {
        if !self.fs.exists(&request.destination)? {
            return Ok(Decision::Write(WriteReason::DestinationMissing));
        }
        if request.force {
            return Ok(Decision::Write(WriteReason::Forced));
        }
        if !request.sync {
            return Ok(Decision::Ignore);
        }
        Ok(self
            .divergence(request)?
            .map_or(Decision::Ignore, |found| {
                Decision::Write(WriteReason::Diverged(found))
            }))
    }

    fn divergence(&self, request: &UploadRequest) -> UploadResult<Option<Divergence>> {
        let destination = request.destination.as_path();

        let existing = self.destination_digest(destination)?;
        if existing != request.checksum {
            debug!(
                existing = %existing,
                expected = %request.checksum,
                "destination has a different checksum than provided"
            );
            return Ok(Some(Divergence::Content));
        }

        if let Some(mode) = request.mode
            && !self.fs.file_mode_matches(destination, mode)?
        {
            debug!(mode = %format!("{mode:o}"), "destination has a different file mode");
            return Ok(Some(Divergence::Mode));
        }

        if request.wants_ownership()
            && !self.fs.owner_or_group_matches(
                destination,
                request.owner.as_deref(),
                request.group.as_deref(),
            )?
        {
            debug!(
                owner = request.owner.as_deref().unwrap_or_default(),
                group = request.group.as_deref().unwrap_or_default(),
                "destination has a different owner or group"
            );
            return Ok(Some(Divergence::Ownership));
        }

        Ok(None)
    }

    fn destination_digest(&self, destination: &Path) -> UploadResult<ContentDigest> {
        let reader = self.fs.open(destination)?;
        let (_, digest) = digest_reader(reader)
            .map_err(|source| UploadError::io("sync.digest_destination", destination, source))?;
        Ok(digest)
    }

    fn write(&self, request: UploadRequest) -> UploadResult<UploadResponse> {
        let staged = self.stage(&request)?;

        let mut fragments = Vec::new();
        fragments.extend(self.apply_mode(&staged.path, request.mode));
        fragments.extend(self.apply_ownership(&staged.path, &request));

        if let Err(err) = self.install(&staged.path, &request) {
            self.discard_staged(&staged.path, "install failure");
            return Err(err);
        }
        debug!(
            source = %request.source.display(),
            staged = %staged.path.display(),
            "installed staged file"
        );

        fragments.push(format!(
            "file successfully copied to destination {}",
            request.destination.display()
        ));
        info!(status = "success", bytes = staged.bytes, "upload installed");

        Ok(UploadResponse::success(
            request.id,
            request.destination,
            staged.bytes,
            &fragments,
        ))
    }

    fn stage(&self, request: &UploadRequest) -> UploadResult<StagedFile> {
        let upload_dir = self.options.upload_dir();
        if self
            .fs
            .create_dir_if_not_exists(upload_dir, directory_mode(request.mode))?
        {
            debug!(dir = %upload_dir.display(), "created staging directory");
        }

        let path = upload_dir.join(staging_file_name(request));
        if self.fs.exists(&path)? {
            debug!(path = %path.display(), "staging file already exists, removing it");
            self.fs.remove(&path)?;
        }

        let mut remote = self
            .remote
            .open(&request.source)
            .map_err(|source| UploadError::transport("stage.open_remote", &request.source, source))?;
        let copied = self.fs.create_file(&path, &mut remote);
        if let Err(err) = remote.close() {
            warn!(
                error = %error_chain(&err),
                source = %request.source.display(),
                "failed to release remote file"
            );
        }
        let (bytes, digest) = copied?;
        debug!(
            bytes,
            md5 = %digest,
            source = %request.source.display(),
            staged = %path.display(),
            "copied remote file to staging"
        );

        if digest != request.checksum {
            self.discard_staged(&path, "checksum mismatch");
            return Err(UploadError::ChecksumMismatch {
                path,
                expected: request.checksum,
                actual: digest,
            });
        }

        Ok(StagedFile { path, bytes })
    }

    fn apply_mode(&self, staged: &Path, mode: Option<u32>) -> Option<String> {
        let mode = mode?;
        match self.fs.change_mode(staged, mode) {
            Ok(()) => {
                debug!(mode = %format!("{mode:o}"), "applied file mode");
                None
            }
            Err(err) => {
                let detail = err.detail();
                warn!(error = %detail, "chmod of staged file failed");
                Some(format!("chmod failed: {detail}"))
            }
        }
    }

    fn apply_ownership(&self, staged: &Path, request: &UploadRequest) -> Option<String> {
        if !request.wants_ownership() {
            return None;
        }
        let owner = request.owner.as_deref();
        let group = request.group.as_deref();
        match self.fs.change_owner(staged, owner, group) {
            Ok(()) => {
                debug!(
                    owner = owner.unwrap_or_default(),
                    group = group.unwrap_or_default(),
                    "applied file ownership"
                );
                None
            }
            Err(err) => {
                let detail = err.detail();
                warn!(error = %detail, "chown of staged file failed");
                Some(format!("chown failed: {detail}"))
            }
        }
    }

    fn install(&self, staged: &Path, request: &UploadRequest) -> UploadResult<()> {
        let destination = request.destination.as_path();
        if let Some(parent) = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            && self
                .fs
                .create_dir_if_not_exists(parent, directory_mode(request.mode))?
        {
            debug!(dir = %parent.display(), "created destination directory");
        }

        if self.fs.exists(destination)? {
            debug!("destination already exists, removing it");
            self.fs.remove(destination)?;
        }

        self.fs.rename(staged, destination)
    }

    fn discard_staged(&self, staged: &Path, reason: &'static str) {
        match self.fs.exists(staged) {
            Ok(false) => {}
            Ok(true) => {
                if let Err(err) = self.fs.remove(staged) {
                    error!(
                        error = %err.detail(),
                        path = %staged.display(),
                        reason,
                        "failed to remove staging file"
                    );
                }
            }
            Err(err) => error!(
                error = %err.detail(),
                path = %staged.display(),
                reason,
                "failed to inspect staging file"
            ),
        }
    }
}

/// Directory mode derived from a file mode: every readable class also gets search access.
/// The owner always keeps full access.
#[must_use]
pub const fn directory_mode(file_mode: Option<u32>) -> u32 {
    match file_mode {
        Some(mode) => {
            let mode = mode & 0o777;
            mode | ((mode & 0o444) >> 2) | OWNER_DIR_BITS
        }
        None => DEFAULT_DIR_MODE,
    }
}

/// Staging file name for `request`: the sanitised request id followed by the source base name.
#[must_use]
pub fn staging_file_name(request: &UploadRequest) -> String {
    let id: String = request
        .id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("{id}-{}", request.source_file_name())
}
