//! Error-related types for [`Resource`](crate::resource::Resource) access.
//!
//! Every failed read is classified as one of:
//! - [`AccessError`]: The content could not be reached (I/O, network, permissions).
//! - [`DecodingError`]: The content was reached, but is malformed.
//! - [`ReadError::UnsupportedOperation`]: The backend cannot perform the request.
//!
//! All error types are [`Clone`], so a memoized failure can be handed out repeatedly.

pub use crate::archive::errors::{
    ArchiveError, ArchiveOpenError, ArchiveResult, ArchiveSniffOpenError,
};
pub use crate::drm::DrmError;
use std::io;
use std::path::PathBuf;
use std::string::{FromUtf8Error, FromUtf16Error};
use std::sync::Arc;

/// Alias for `Result<T, ReadError>`.
pub type ReadResult<T> = Result<T, ReadError>;

/// Unified error type for reading a [`Resource`](crate::resource::Resource).
///
/// Decorators never swallow the innermost error;
/// the kind observed by a caller is the kind produced by the backing store.
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug)]
pub enum ReadError {
    /// The content could not be accessed.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The content was accessed, although it is malformed.
    #[error(transparent)]
    Decoding(#[from] DecodingError),

    /// The requested operation is not supported by the backing store,
    /// such as a range read against a source that cannot seek.
    #[error("[UnsupportedOperation]: {0}")]
    UnsupportedOperation(String),
}

impl ReadError {
    /// Returns `true` if the error is an [`AccessError`].
    pub fn is_access(&self) -> bool {
        matches!(self, Self::Access(_))
    }

    /// Returns `true` if the error is a [`DecodingError`].
    pub fn is_decoding(&self) -> bool {
        matches!(self, Self::Decoding(_))
    }

    /// Returns `true` if the error is [`ReadError::UnsupportedOperation`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation(_))
    }

    pub(crate) fn io(source: io::Error, path: Option<PathBuf>) -> Self {
        Self::Access(AccessError::Io {
            source: Arc::new(source),
            path,
        })
    }
}

/// Possible failures reaching the content of a resource.
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug)]
pub enum AccessError {
    /// An I/O operation on the local filesystem failed.
    #[error("[Io - `{path:?}`]: {source}")]
    Io {
        /// The root cause of the error.
        source: Arc<io::Error>,
        /// The path responsible for triggering the error, if applicable.
        path: Option<PathBuf>,
    },

    /// The requested resource does not exist.
    #[error("[NotFound - `{0}`]: Requested resource does not exist")]
    NotFound(String),

    /// Access to the resource was refused,
    /// such as a protected resource without an available license.
    #[error("[Forbidden - `{0}`]: Access to the resource is not permitted")]
    Forbidden(String),

    /// A remote server answered with an unexpected status.
    #[error("[Http - `{url}`]: Unexpected status {status}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// A remote server could not be reached.
    #[error("[Network - `{url}`]: {source}")]
    Network {
        /// The root cause of the error.
        source: Arc<dyn std::error::Error + Send + Sync>,
        /// The requested URL.
        url: String,
    },

    /// The resource or its container was closed before the read.
    #[error("[Closed]: The resource has been closed")]
    Closed,
}

/// Possible failures interpreting content once it has been accessed.
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug)]
pub enum DecodingError {
    /// The archive structure is malformed or uses an unreadable layout.
    #[error("[Archive]: {0}")]
    Archive(String),

    /// Decrypting protected content failed or produced invalid data.
    #[error("[Decryption]: {0}")]
    Decryption(String),

    /// A deflate stream could not be inflated.
    #[error("[Inflate]: {0}")]
    Inflate(Arc<io::Error>),

    /// The content is not valid text.
    #[error(transparent)]
    Utf(#[from] UtfError),

    /// The content is not valid JSON for the requested type.
    #[error("[Json]: {0}")]
    Json(Arc<serde_json::Error>),

    /// Any other malformed content.
    #[error("[Other]: {0}")]
    Other(String),
}

impl From<serde_json::Error> for DecodingError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(Arc::new(error))
    }
}

/// Specific error details regarding `UTF`.
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug)]
pub enum UtfError {
    /// Uneven byte count of UTF-16 data.
    #[error("UTF-16 data needs to contain an even amount of bytes")]
    UnevenByteCount,

    /// Invalid UTF-8 data.
    #[error(transparent)]
    InvalidUtf8(#[from] FromUtf8Error),

    /// Invalid UTF-16 data.
    #[error(transparent)]
    InvalidUtf16(Arc<FromUtf16Error>),
}
