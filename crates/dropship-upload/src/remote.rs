//! Remote byte sources the upload manager pulls files from.
//!
//! # Design
//! - [`RemoteSource`] opens a path and hands back a [`RemoteFile`]; a failed open holds nothing.
//! - [`RemoteFile::close`] releases the stream *and* whatever session it rides on, reporting
//!   every failure rather than the first one.
//! - The SFTP variant multiplexes each open over an already-established SSH session.

use std::fmt;
use std::io::{self, Read};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use dropship_config::SshSettings;
use ssh2::{File as SftpHandle, Session, Sftp};
use thiserror::Error;
use tracing::{debug, info};

/// Result alias for remote source operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised by remote sources.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Establishing or using the SSH session failed.
    #[error("ssh session failure")]
    Session {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying libssh2 error.
        source: ssh2::Error,
    },
    /// Socket-level failure while reaching the remote peer.
    #[error("remote io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The remote path could not be opened.
    #[error("remote file unavailable")]
    Open {
        /// Remote path that failed to open.
        path: PathBuf,
        /// Underlying error reported by the source.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Releasing the stream, its session, or both failed.
    #[error("remote release failed: {}", ReleaseFailures(.failures))]
    Release {
        /// Every release step that failed, in release order.
        failures: Vec<RemoteError>,
    },
}

struct ReleaseFailures<'a>(&'a [RemoteError]);

impl fmt::Display for ReleaseFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, failure) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", crate::error::error_chain(failure))?;
        }
        Ok(())
    }
}

impl RemoteError {
    /// Combine the outcome of independent release steps into a single result.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Release`] carrying every failed step.
    pub fn aggregate(steps: impl IntoIterator<Item = RemoteResult<()>>) -> RemoteResult<()> {
        let failures: Vec<RemoteError> = steps.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self::Release { failures })
        }
    }
}

/// A readable remote stream that must be explicitly released.
pub trait RemoteFile: Read + Send {
    /// Release the stream and any session it depends on.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Release`] listing every release step that failed.
    fn close(self: Box<Self>) -> RemoteResult<()>;
}

/// Capability to open files held by the controller.
pub trait RemoteSource: Send + Sync {
    /// Open `path` for streaming.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport cannot provide the file; nothing stays open.
    fn open(&self, path: &Path) -> RemoteResult<Box<dyn RemoteFile>>;
}

/// Remote source that opens files over SFTP sub-sessions of an established SSH session.
#[derive(Clone)]
pub struct SftpSource {
    session: Session,
}

impl SftpSource {
    /// Wrap an SSH session that has already completed authentication.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Connect and authenticate a new SSH session described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error when the TCP connection, handshake, or authentication fails.
    pub fn connect(settings: &SshSettings) -> RemoteResult<Self> {
        let tcp = TcpStream::connect(settings.address.as_str()).map_err(|source| {
            RemoteError::Io {
                operation: "sftp.connect",
                source,
            }
        })?;
        let mut session = Session::new().map_err(|source| RemoteError::Session {
            operation: "sftp.session_new",
            source,
        })?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|source| RemoteError::Session {
            operation: "sftp.handshake",
            source,
        })?;

        match settings.identity_file.as_deref() {
            Some(identity) => session
                .userauth_pubkey_file(&settings.user, None, identity, None)
                .map_err(|source| RemoteError::Session {
                    operation: "sftp.userauth_pubkey_file",
                    source,
                })?,
            None => session
                .userauth_agent(&settings.user)
                .map_err(|source| RemoteError::Session {
                    operation: "sftp.userauth_agent",
                    source,
                })?,
        }

        info!(
            address = %settings.address,
            user = %settings.user,
            "ssh session established"
        );
        Ok(Self::new(session))
    }
}

impl fmt::Debug for SftpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpSource").finish_non_exhaustive()
    }
}

impl RemoteSource for SftpSource {
    fn open(&self, path: &Path) -> RemoteResult<Box<dyn RemoteFile>> {
        let sftp = self.session.sftp().map_err(|source| RemoteError::Session {
            operation: "sftp.open_subsystem",
            source,
        })?;
        let handle = sftp.open(path).map_err(|source| RemoteError::Open {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        debug!(path = %path.display(), "opened remote file over sftp");
        Ok(Box::new(SftpFile { handle, sftp }))
    }
}

/// Remote file that owns both its SFTP handle and the SFTP sub-session it was opened on.
pub struct SftpFile {
    handle: SftpHandle,
    sftp: Sftp,
}

impl Read for SftpFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle.read(buf)
    }
}

impl RemoteFile for SftpFile {
    fn close(self: Box<Self>) -> RemoteResult<()> {
        let Self {
            mut handle,
            mut sftp,
        } = *self;
        let stream = handle.close().map_err(|source| RemoteError::Session {
            operation: "sftp.close_file",
            source,
        });
        let session = sftp.shutdown().map_err(|source| RemoteError::Session {
            operation: "sftp.shutdown",
            source,
        });
        RemoteError::aggregate([stream, session])
    }
}
