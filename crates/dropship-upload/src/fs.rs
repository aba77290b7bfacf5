//! Local filesystem capability surface consumed by the upload manager.
//!
//! # Design
//! - Keep every disk interaction behind [`FileSystem`] so orchestration stays storage-agnostic.
//! - Comparison helpers report `false` for missing paths instead of failing.
//! - `create_file` never leaves a partially written file behind on failure.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::Path;

use tracing::warn;

use crate::digest::{ContentDigest, DigestReader};
use crate::error::{UploadError, UploadResult};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};

#[cfg(unix)]
use nix::unistd::{Gid, Group, Uid, User, chown};

/// Permission bits considered when comparing or applying modes.
pub const MODE_MASK: u32 = 0o7777;

/// Operations the upload pipeline needs from local storage.
pub trait FileSystem: Send + Sync {
    /// Whether `path` exists; a missing path is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the path cannot be inspected.
    fn exists(&self, path: &Path) -> UploadResult<bool>;

    /// Open an existing file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    fn open(&self, path: &Path) -> UploadResult<Box<dyn Read + Send>>;

    /// Copy `source` into a new file at `path`, returning the bytes written and their digest.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created, written, or flushed. No file is
    /// left at `path` in that case.
    fn create_file(&self, path: &Path, source: &mut dyn Read) -> UploadResult<(u64, ContentDigest)>;

    /// Create `dir` (and missing parents) with `mode`; reports whether anything was created.
    ///
    /// # Errors
    ///
    /// Returns an error when creation fails or `dir` exists but is not a directory.
    fn create_dir_if_not_exists(&self, dir: &Path, mode: u32) -> UploadResult<bool>;

    /// Apply permission bits to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the mode cannot be applied.
    fn change_mode(&self, path: &Path, mode: u32) -> UploadResult<()>;

    /// Apply owner and/or group to `path`; `None` leaves that attribute unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error when an account cannot be resolved or the change is refused.
    fn change_owner(&self, path: &Path, owner: Option<&str>, group: Option<&str>)
    -> UploadResult<()>;

    /// Remove a file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be removed.
    fn remove(&self, path: &Path) -> UploadResult<()>;

    /// Atomically rename `from` to `to` within one volume.
    ///
    /// # Errors
    ///
    /// Returns an error when the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> UploadResult<()>;

    /// Whether the permission bits of `path` equal `mode`; `false` when `path` is missing.
    ///
    /// # Errors
    ///
    /// Returns an error when metadata cannot be read for an existing path.
    fn file_mode_matches(&self, path: &Path, mode: u32) -> UploadResult<bool>;

    /// Whether `path` is owned by the specified owner and group; unspecified sides always
    /// match and a missing path never does.
    ///
    /// # Errors
    ///
    /// Returns an error when metadata or account lookups fail.
    fn owner_or_group_matches(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> UploadResult<bool>;
}

/// [`FileSystem`] backed by the host's local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Construct the local filesystem capability.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn metadata_if_exists(path: &Path, operation: &'static str) -> UploadResult<Option<fs::Metadata>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(meta)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(UploadError::io(operation, path, err)),
        }
    }

    fn write_stream(path: &Path, source: &mut dyn Read) -> UploadResult<(u64, ContentDigest)> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source_err| UploadError::io("create_file.open", path, source_err))?;
        let mut digesting = DigestReader::new(source);
        io::copy(&mut digesting, &mut file)
            .map_err(|source_err| UploadError::io("create_file.copy", path, source_err))?;
        file.sync_all()
            .map_err(|source_err| UploadError::io("create_file.sync", path, source_err))?;
        Ok(digesting.finish())
    }
}

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> UploadResult<bool> {
        path.try_exists()
            .map_err(|source| UploadError::io("exists", path, source))
    }

    fn open(&self, path: &Path) -> UploadResult<Box<dyn Read + Send>> {
        let file = File::open(path).map_err(|source| UploadError::io("open", path, source))?;
        Ok(Box::new(file))
    }

    fn create_file(&self, path: &Path, source: &mut dyn Read) -> UploadResult<(u64, ContentDigest)> {
        Self::write_stream(path, source).inspect_err(|_| {
            if let Err(cleanup) = fs::remove_file(path)
                && cleanup.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    error = %cleanup,
                    path = %path.display(),
                    "failed to remove partially written file"
                );
            }
        })
    }

    fn create_dir_if_not_exists(&self, dir: &Path, mode: u32) -> UploadResult<bool> {
        if let Some(meta) = Self::metadata_if_exists(dir, "create_dir.stat")? {
            if meta.is_dir() {
                return Ok(false);
            }
            return Err(UploadError::io(
                "create_dir.not_a_directory",
                dir,
                io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a directory"),
            ));
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(mode & MODE_MASK);
        #[cfg(not(unix))]
        let _ = mode;
        builder
            .create(dir)
            .map_err(|source| UploadError::io("create_dir.create", dir, source))?;
        Ok(true)
    }

    #[cfg(unix)]
    fn change_mode(&self, path: &Path, mode: u32) -> UploadResult<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & MODE_MASK))
            .map_err(|source| UploadError::io("change_mode", path, source))
    }

    #[cfg(not(unix))]
    fn change_mode(&self, _path: &Path, _mode: u32) -> UploadResult<()> {
        Err(UploadError::Unsupported {
            operation: "change_mode",
        })
    }

    #[cfg(unix)]
    fn change_owner(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> UploadResult<()> {
        let uid = owner.map(resolve_owner).transpose()?;
        let gid = group.map(resolve_group).transpose()?;
        if uid.is_none() && gid.is_none() {
            return Ok(());
        }
        chown(path, uid, gid).map_err(|source| UploadError::nix("change_owner", path, source))
    }

    #[cfg(not(unix))]
    fn change_owner(
        &self,
        _path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> UploadResult<()> {
        if owner.is_none() && group.is_none() {
            return Ok(());
        }
        Err(UploadError::Unsupported {
            operation: "change_owner",
        })
    }

    fn remove(&self, path: &Path) -> UploadResult<()> {
        fs::remove_file(path).map_err(|source| UploadError::io("remove", path, source))
    }

    fn rename(&self, from: &Path, to: &Path) -> UploadResult<()> {
        fs::rename(from, to).map_err(|source| UploadError::io("rename", to, source))
    }

    #[cfg(unix)]
    fn file_mode_matches(&self, path: &Path, mode: u32) -> UploadResult<bool> {
        Ok(Self::metadata_if_exists(path, "file_mode_matches")?
            .is_some_and(|meta| meta.permissions().mode() & MODE_MASK == mode & MODE_MASK))
    }

    #[cfg(not(unix))]
    fn file_mode_matches(&self, _path: &Path, _mode: u32) -> UploadResult<bool> {
        Err(UploadError::Unsupported {
            operation: "file_mode_matches",
        })
    }

    #[cfg(unix)]
    fn owner_or_group_matches(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> UploadResult<bool> {
        let Some(meta) = Self::metadata_if_exists(path, "owner_or_group_matches")? else {
            return Ok(false);
        };

        if let Some(owner) = owner {
            match resolve_owner(owner) {
                Ok(uid) if uid.as_raw() == meta.uid() => {}
                Ok(_) | Err(UploadError::UnknownAccount { .. }) => return Ok(false),
                Err(err) => return Err(err),
            }
        }
        if let Some(group) = group {
            match resolve_group(group) {
                Ok(gid) if gid.as_raw() == meta.gid() => {}
                Ok(_) | Err(UploadError::UnknownAccount { .. }) => return Ok(false),
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    #[cfg(not(unix))]
    fn owner_or_group_matches(
        &self,
        _path: &Path,
        _owner: Option<&str>,
        _group: Option<&str>,
    ) -> UploadResult<bool> {
        Err(UploadError::Unsupported {
            operation: "owner_or_group_matches",
        })
    }
}

/// Resolve an owner given as a user name or numeric uid.
#[cfg(unix)]
fn resolve_owner(spec: &str) -> UploadResult<Uid> {
    let trimmed = spec.trim();
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(Uid::from_raw(id));
    }
    User::from_name(trimmed)
        .map_err(|source| UploadError::UserLookup {
            user: trimmed.to_string(),
            source,
        })?
        .map(|user| user.uid)
        .ok_or_else(|| UploadError::UnknownAccount {
            field: "owner",
            value: trimmed.to_string(),
        })
}

/// Resolve a group given as a group name or numeric gid.
#[cfg(unix)]
fn resolve_group(spec: &str) -> UploadResult<Gid> {
    let trimmed = spec.trim();
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(Gid::from_raw(id));
    }
    Group::from_name(trimmed)
        .map_err(|source| UploadError::GroupLookup {
            group: trimmed.to_string(),
            source,
        })?
        .map(|group| group.gid)
        .ok_or_else(|| UploadError::UnknownAccount {
            field: "group",
            value: trimmed.to_string(),
        })
}
