//! Archive-backed [`Container`] types and the openers producing them.
//!
//! - [`zip`]: Random-access reading of ZIP archives.
//! - [`directory`]: Exploded archives on the local filesystem.
//! - [`opener`]: Turning a [`Resource`](crate::resource::Resource) into a container.

pub mod directory;
pub(crate) mod errors;
pub mod opener;
pub mod zip;

use crate::archive::directory::DirectoryContainer;
use crate::archive::errors::{ArchiveError, ArchiveResult};
use crate::archive::zip::ZipContainer;
use crate::container::Container;
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

/// The seekable content an archive is read from.
#[derive(Clone, Debug)]
pub(crate) enum ArchiveSource {
    File(PathBuf),
    Memory(Bytes),
}

pub(crate) trait ArchiveReader: Read + Seek + Send {}

impl<R: Read + Seek + Send> ArchiveReader for R {}

impl ArchiveSource {
    pub(crate) fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Memory(_) => None,
        }
    }

    /// Opens a fresh, independent reader positioned at the start.
    pub(crate) fn open(&self) -> ArchiveResult<Box<dyn ArchiveReader>> {
        match self {
            Self::File(path) => match File::open(path) {
                Ok(file) => Ok(Box::new(BufReader::new(file))),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    Err(ArchiveError::FileNotFound { path: path.clone() })
                }
                Err(error) => Err(ArchiveError::reading(error, Some(path.clone()))),
            },
            Self::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
        }
    }
}

/// Opens the content at `path` as a container.
///
/// If `path` is a directory, its contents are accessed directly as a
/// [`DirectoryContainer`], which makes a ZIP file unnecessary.
/// Otherwise, `path` is opened as a [`ZipContainer`].
///
/// This call performs blocking I/O.
pub fn open_container(path: impl AsRef<Path>) -> ArchiveResult<Box<dyn Container>> {
    let path = path.as_ref();

    Ok(if path.is_dir() {
        Box::new(DirectoryContainer::new(path)?)
    } else {
        Box::new(ZipContainer::open(path)?)
    })
}
