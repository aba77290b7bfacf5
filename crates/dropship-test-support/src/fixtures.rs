//! Temporary directory and file fixtures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Create a scratch directory removed when the handle drops.
///
/// # Errors
///
/// Returns the underlying IO error when the directory cannot be created.
pub fn temp_dir() -> io::Result<TempDir> {
    tempfile::Builder::new().prefix("dropship-").tempdir()
}

/// Write `bytes` to `dir/name`, creating intermediate directories.
///
/// # Errors
///
/// Returns the underlying IO error when the file cannot be written.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes)?;
    Ok(path)
}
