//! Test doubles shared by the upload integration suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dropship_config::UploadOptions;
use dropship_upload::{
    ContentDigest, FileSystem, LocalFileSystem, RemoteError, RemoteFile, RemoteResult,
    RemoteSource, UploadError, UploadManager, UploadResult, encode_checksum,
};
use serde_json::json;
use tempfile::TempDir;

/// Remote source serving byte buffers keyed by path.
#[derive(Default)]
pub struct MemoryRemote {
    files: HashMap<PathBuf, Vec<u8>>,
    fail_close: bool,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.insert(PathBuf::from(path), bytes.to_vec());
        self
    }

    /// Every stream handed out fails to release.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl RemoteSource for MemoryRemote {
    fn open(&self, path: &Path) -> RemoteResult<Box<dyn RemoteFile>> {
        let bytes = self.files.get(path).cloned().ok_or_else(|| RemoteError::Open {
            path: path.to_path_buf(),
            source: Box::new(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        })?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryFile {
            cursor: Cursor::new(bytes),
            fail_close: self.fail_close,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct MemoryFile {
    cursor: Cursor<Vec<u8>>,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl RemoteFile for MemoryFile {
    fn close(self: Box<Self>) -> RemoteResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return RemoteError::aggregate([
                Err(RemoteError::Io {
                    operation: "file.close",
                    source: io::Error::other("stream reset"),
                }),
                Err(RemoteError::Io {
                    operation: "session.close",
                    source: io::Error::other("session gone"),
                }),
            ]);
        }
        Ok(())
    }
}

/// Local filesystem that can be told to refuse chmod, chown, or the final rename.
#[derive(Default)]
pub struct FaultyFs {
    pub(crate) inner: LocalFileSystem,
    pub fail_chmod: bool,
    pub fail_chown: bool,
    pub fail_rename: bool,
}

fn refused(operation: &'static str, path: &Path) -> UploadError {
    UploadError::Io {
        operation,
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::PermissionDenied, "operation not permitted"),
    }
}

impl FileSystem for FaultyFs {
    fn exists(&self, path: &Path) -> UploadResult<bool> {
        self.inner.exists(path)
    }

    fn open(&self, path: &Path) -> UploadResult<Box<dyn Read + Send>> {
        self.inner.open(path)
    }

    fn create_file(&self, path: &Path, source: &mut dyn Read) -> UploadResult<(u64, ContentDigest)> {
        self.inner.create_file(path, source)
    }

    fn create_dir_if_not_exists(&self, dir: &Path, mode: u32) -> UploadResult<bool> {
        self.inner.create_dir_if_not_exists(dir, mode)
    }

    fn change_mode(&self, path: &Path, mode: u32) -> UploadResult<()> {
        if self.fail_chmod {
            return Err(refused("chmod", path));
        }
        self.inner.change_mode(path, mode)
    }

    fn change_owner(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> UploadResult<()> {
        if self.fail_chown {
            return Err(refused("chown", path));
        }
        self.inner.change_owner(path, owner, group)
    }

    fn remove(&self, path: &Path) -> UploadResult<()> {
        self.inner.remove(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> UploadResult<()> {
        if self.fail_rename {
            return Err(refused("rename", to));
        }
        self.inner.rename(from, to)
    }

    fn file_mode_matches(&self, path: &Path, mode: u32) -> UploadResult<bool> {
        self.inner.file_mode_matches(path, mode)
    }

    fn owner_or_group_matches(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> UploadResult<bool> {
        self.inner.owner_or_group_matches(path, owner, group)
    }
}

/// Scratch layout: `<root>/stage` for staging and `<root>/out` for destinations.
pub struct Harness {
    pub root: TempDir,
    pub remote: Arc<MemoryRemote>,
    pub manager: UploadManager,
}

impl Harness {
    pub fn new(remote: MemoryRemote) -> io::Result<Self> {
        Self::with_fs(remote, FaultyFs::default(), Vec::new())
    }

    pub fn with_fs(remote: MemoryRemote, fs: FaultyFs, deny: Vec<String>) -> io::Result<Self> {
        let root = dropship_test_support::fixtures::temp_dir()?;
        let options = UploadOptions {
            upload_dir: root.path().join("stage"),
            file_push_deny: deny,
        };
        let remote = Arc::new(remote);
        let manager = UploadManager::new(Arc::new(fs), remote.clone(), Arc::new(options));
        Ok(Self {
            root,
            remote,
            manager,
        })
    }

    pub fn stage_dir(&self) -> PathBuf {
        self.root.path().join("stage")
    }

    pub fn destination(&self, name: &str) -> PathBuf {
        self.root.path().join("out").join(name)
    }

    pub fn staged_entries(&self) -> io::Result<usize> {
        match std::fs::read_dir(self.stage_dir()) {
            Ok(entries) => Ok(entries.count()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err),
        }
    }
}

/// Build a raw payload; `extra` fields are merged over the required ones.
pub fn payload(
    id: &str,
    source: &str,
    destination: &Path,
    content: &[u8],
    extra: serde_json::Value,
) -> Vec<u8> {
    let mut document = json!({
        "id": id,
        "source_file_path": source,
        "destination_path": destination,
        "md5_checksum": encode_checksum(&ContentDigest::of(content)),
    });
    if let (Some(target), Some(extra)) = (document.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    document.to_string().into_bytes()
}
