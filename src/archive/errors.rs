use crate::errors::{AccessError, DecodingError, ReadError};
use crate::media_type::MediaType;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Alias for `Result<T, ArchiveError>`.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Possible failures opening a ZIP archive.
///
/// These errors are thrown **before** a container is instantiated;
/// a container is never partially constructed.
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug)]
pub enum ArchiveError {
    /// The archive file does not exist.
    #[error("[FileNotFound - `{path:?}`]: Archive file does not exist")]
    FileNotFound {
        /// The path of the missing file.
        path: PathBuf,
    },

    /// The content does not begin with a ZIP signature.
    ///
    /// Path is [`None`] when the archive was opened from memory.
    #[error("[NotAZip - `{path:?}`]: Content is not a ZIP archive")]
    NotAZip {
        /// The path responsible for triggering the error, if applicable.
        path: Option<PathBuf>,
    },

    /// The archive is unreadable due to I/O or a malformed central directory.
    ///
    /// Path is [`None`] when the archive was opened from memory.
    #[error("[Reading - `{path:?}`]: {source}")]
    Reading {
        /// The root cause of the error.
        source: Arc<io::Error>,
        /// The path responsible for triggering the error, if applicable.
        path: Option<PathBuf>,
    },
}

impl ArchiveError {
    pub(crate) fn reading(source: impl Into<io::Error>, path: Option<PathBuf>) -> Self {
        Self::Reading {
            source: Arc::new(source.into()),
            path,
        }
    }
}

impl From<ArchiveError> for ReadError {
    fn from(error: ArchiveError) -> Self {
        match error {
            ArchiveError::FileNotFound { path } => {
                AccessError::NotFound(path.to_string_lossy().into_owned()).into()
            }
            ArchiveError::NotAZip { .. } => DecodingError::Archive(error.to_string()).into(),
            ArchiveError::Reading { source, path } => AccessError::Io { source, path }.into(),
        }
    }
}

/// Possible failures opening a known format with an
/// [`ArchiveOpener`](crate::archive::opener::ArchiveOpener).
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug)]
pub enum ArchiveOpenError {
    /// The opener does not support the given format.
    #[error("[FormatNotSupported - `{0}`]: No opener supports the format")]
    FormatNotSupported(MediaType),

    /// The format is supported, although reading the archive failed.
    #[error("[Reading]: {0}")]
    Reading(#[from] ReadError),
}

/// Possible failures sniffing and opening an unknown format with an
/// [`ArchiveOpener`](crate::archive::opener::ArchiveOpener).
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug)]
pub enum ArchiveSniffOpenError {
    /// No opener recognized the content.
    #[error("[FormatNotRecognized]: No opener recognized the content")]
    FormatNotRecognized,

    /// The format was recognized, although reading the archive failed.
    #[error("[Reading]: {0}")]
    Reading(#[from] ReadError),
}

impl From<ArchiveError> for ArchiveOpenError {
    fn from(error: ArchiveError) -> Self {
        Self::Reading(error.into())
    }
}

impl From<ArchiveError> for ArchiveSniffOpenError {
    fn from(error: ArchiveError) -> Self {
        Self::Reading(error.into())
    }
}
