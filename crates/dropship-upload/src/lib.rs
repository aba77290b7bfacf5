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
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Staged, checksum-verified delivery of controller-pushed files.
//!
//! Layout: `request.rs` (payload decoding/validation), `manager.rs` (decision policy and
//! the stage/verify/install pipeline), `fs.rs` (local filesystem capability), `remote.rs`
//! (remote byte sources, SFTP), `locks.rs` (per-destination serialisation),
//! `digest.rs` (content digests), `response.rs` (controller response).

pub mod digest;
pub mod error;
pub mod fs;
pub mod locks;
pub mod manager;
pub mod remote;
pub mod request;
pub mod response;

pub use digest::ContentDigest;
pub use error::{ErrorKind, UploadError, UploadResult, error_chain};
pub use fs::{FileSystem, LocalFileSystem};
pub use locks::{DestinationGuard, DestinationLocks};
pub use manager::{Decision, Divergence, OptionsProvider, UploadManager, WriteReason};
pub use remote::{RemoteError, RemoteFile, RemoteResult, RemoteSource, SftpFile, SftpSource};
pub use request::{UploadPayload, UploadRequest, encode_checksum};
pub use response::{MESSAGE_DELIMITER, UploadResponse, UploadStatus};
