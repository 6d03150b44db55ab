//! Random-access reading of ZIP archives.
//!
//! The central directory is scanned once when a [`ZipContainer`] is opened.
//! Entry content is only read when a [`ZipEntryResource`] is,
//! each resource owning an independent decompressing cursor.

mod cursor;
mod entry;

pub use self::entry::{EntryCompression, ZipEntry, ZipEntryResource};

use crate::archive::ArchiveSource;
use crate::archive::errors::{ArchiveError, ArchiveResult};
use crate::container::Container;
use crate::resource::Resource;
use crate::util::sync::CloseFlag;
use crate::util::uri::RelativeUrl;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::CompressionMethod;

/// Signatures a ZIP archive may begin with:
/// a local file header, an empty archive, or a spanned archive marker.
const ZIP_SIGNATURES: [[u8; 4]; 3] = [*b"PK\x03\x04", *b"PK\x05\x06", *b"PK\x07\x08"];

/// Returns `true` if `bytes` begins with a ZIP signature.
pub(crate) fn is_zip_signature(bytes: &[u8]) -> bool {
    bytes
        .get(..4)
        .is_some_and(|signature| ZIP_SIGNATURES.iter().any(|zip| zip == signature))
}

/// State shared between a [`ZipContainer`] and the resources it hands out.
#[derive(Debug)]
pub(crate) struct ZipShared {
    pub(crate) source: ArchiveSource,
    pub(crate) settings: ZipSettings,
    pub(crate) closed: CloseFlag,
}

/// A [`Container`] over the entries of a ZIP archive.
///
/// Directory entries are omitted.
/// Entry names escaping the archive root (`../`) are skipped.
///
/// # Examples
/// Opening a ZIP file and reading part of an entry:
/// ```no_run
/// # use rbook_fetch::archive::zip::ZipContainer;
/// # use rbook_fetch::container::Container;
/// # use rbook_fetch::resource::Resource;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let container = ZipContainer::open("moby-dick.epub")?;
/// let chapter = container.get("OPS/chapter_001.xhtml").unwrap();
///
/// // Only the bytes up to the end of the range are decompressed
/// let head = chapter.read(Some(0..256)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ZipContainer {
    shared: Arc<ZipShared>,
    source_url: Option<String>,
    entries: BTreeSet<RelativeUrl>,
    metadata: BTreeMap<RelativeUrl, Arc<ZipEntry>>,
}

impl ZipContainer {
    /// Opens the ZIP file at `path` with default [`ZipSettings`].
    ///
    /// This call performs blocking I/O.
    ///
    /// # Errors
    /// - [`ArchiveError::FileNotFound`]: When `path` does not exist.
    /// - [`ArchiveError::NotAZip`]: When the file does not begin with a ZIP signature.
    /// - [`ArchiveError::Reading`]: When the file or its central directory is unreadable.
    pub fn open(path: impl Into<PathBuf>) -> ArchiveResult<Self> {
        Self::open_with(path, ZipSettings::default())
    }

    /// Opens the ZIP file at `path` with the specified [`ZipSettings`].
    ///
    /// See [`Self::open`] for details.
    pub fn open_with(
        path: impl Into<PathBuf>,
        settings: impl Into<ZipSettings>,
    ) -> ArchiveResult<Self> {
        Self::new(ArchiveSource::File(path.into()), settings.into())
    }

    /// Reads a ZIP archive held in memory with default [`ZipSettings`].
    ///
    /// # Errors
    /// - [`ArchiveError::NotAZip`]: When `bytes` does not begin with a ZIP signature.
    /// - [`ArchiveError::Reading`]: When the central directory is malformed.
    pub fn read(bytes: impl Into<Bytes>) -> ArchiveResult<Self> {
        Self::read_with(bytes, ZipSettings::default())
    }

    /// Reads a ZIP archive held in memory with the specified [`ZipSettings`].
    ///
    /// See [`Self::read`] for details.
    pub fn read_with(
        bytes: impl Into<Bytes>,
        settings: impl Into<ZipSettings>,
    ) -> ArchiveResult<Self> {
        Self::new(ArchiveSource::Memory(bytes.into()), settings.into())
    }

    fn new(source: ArchiveSource, settings: ZipSettings) -> ArchiveResult<Self> {
        let path = source.path().map(Path::to_path_buf);
        let mut reader = source.open()?;

        check_signature(&mut reader, path.as_deref())?;

        let mut zip = zip::ZipArchive::new(reader)
            .map_err(|error| ArchiveError::reading(error, path.clone()))?;
        let mut metadata = BTreeMap::new();

        for index in 0..zip.len() {
            let file = zip
                .by_index_raw(index)
                .map_err(|error| ArchiveError::reading(error, path.clone()))?;

            if file.is_dir() {
                continue;
            }
            let Some(url) = RelativeUrl::from_path(file.name()) else {
                tracing::warn!(name = file.name(), "skipping zip entry outside the archive root");
                continue;
            };
            if metadata.contains_key(&url) {
                tracing::warn!(name = file.name(), "skipping duplicate zip entry");
                continue;
            }

            let compression = match file.compression() {
                _ if file.encrypted() => EntryCompression::Unsupported("encrypted".to_owned()),
                CompressionMethod::Stored => EntryCompression::Stored,
                CompressionMethod::Deflated => EntryCompression::Deflated,
                method => EntryCompression::Unsupported(format!("{method:?}")),
            };
            if compression == EntryCompression::Stored && file.compressed_size() != file.size() {
                let message = format!(
                    "stored zip entry `{}` declares {} bytes but occupies {}",
                    file.name(),
                    file.size(),
                    file.compressed_size(),
                );
                let error = io::Error::new(io::ErrorKind::InvalidData, message);
                return Err(ArchiveError::reading(error, path.clone()));
            }
            let entry = ZipEntry {
                path: url.clone(),
                uncompressed_length: file.size(),
                compressed_length: (compression != EntryCompression::Stored)
                    .then(|| file.compressed_size()),
                compression,
                header_offset: file.header_start(),
            };
            metadata.insert(url, Arc::new(entry));
        }

        tracing::debug!(path = ?path, entries = metadata.len(), "opened zip container");

        Ok(Self {
            source_url: path.as_deref().and_then(Path::to_str).map(str::to_owned),
            entries: metadata.keys().cloned().collect(),
            metadata,
            shared: Arc::new(ZipShared {
                source,
                settings,
                closed: CloseFlag::new(),
            }),
        })
    }

    /// Returns the metadata of the entry at `href`, if present.
    pub fn entry(&self, href: &str) -> Option<&ZipEntry> {
        RelativeUrl::parse(href)
            .and_then(|url| self.metadata.get(&url))
            .map(Arc::as_ref)
    }

    /// The settings the container was opened with.
    pub fn settings(&self) -> &ZipSettings {
        &self.shared.settings
    }
}

fn check_signature<R: Read + Seek>(reader: &mut R, path: Option<&Path>) -> ArchiveResult<()> {
    let mut signature = [0; 4];

    match reader.read_exact(&mut signature) {
        Ok(()) if is_zip_signature(&signature) => {}
        Ok(()) => {
            return Err(ArchiveError::NotAZip {
                path: path.map(Path::to_path_buf),
            });
        }
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ArchiveError::NotAZip {
                path: path.map(Path::to_path_buf),
            });
        }
        Err(error) => return Err(ArchiveError::reading(error, path.map(Path::to_path_buf))),
    }
    reader
        .seek(SeekFrom::Start(0))
        .map(|_| ())
        .map_err(|error| ArchiveError::reading(error, path.map(Path::to_path_buf)))
}

#[async_trait]
impl Container for ZipContainer {
    fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    fn entries(&self) -> &BTreeSet<RelativeUrl> {
        &self.entries
    }

    fn get(&self, href: &str) -> Option<Box<dyn Resource>> {
        if self.shared.closed.is_closed() {
            return None;
        }
        let url = RelativeUrl::parse(href)?;
        let entry = self.metadata.get(&url)?;

        Some(Box::new(ZipEntryResource::new(
            self.shared.clone(),
            entry.clone(),
        )))
    }

    async fn close(&self) {
        if self.shared.closed.close() {
            tracing::debug!(source = ?self.source_url, "closed zip container");
        }
    }
}

/// Settings for reading a [`ZipContainer`].
///
/// To create a mutable settings instance, see
/// [`ZipSettings::builder`] or [`ZipSettings::default`].
///
/// # Examples
/// ```
/// # use rbook_fetch::archive::zip::ZipSettings;
/// let settings = ZipSettings::builder()
///     .discard_buffer_size(64 * 1024)
///     .seek_stored_entries(false)
///     .build();
///
/// assert_eq!(64 * 1024, settings.discard_buffer_size);
/// ```
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct ZipSettings {
    /// The chunk size used to decompress and discard bytes
    /// preceding the start of a ranged read within a compressed entry.
    ///
    /// A value of `0` is treated as `1`.
    ///
    /// Default: `32 KiB`
    pub discard_buffer_size: usize,
    /// Whether uncompressed (stored) entries are read by seeking directly
    /// to the requested offset.
    ///
    /// When `false`, stored entries are read through the same
    /// discard-and-skip path as compressed entries.
    ///
    /// Default: `true`
    pub seek_stored_entries: bool,
}

impl ZipSettings {
    /// Returns a builder to create a [`ZipSettings`] instance.
    pub fn builder() -> ZipSettingsBuilder {
        ZipSettingsBuilder(Self::default())
    }
}

impl Default for ZipSettings {
    fn default() -> Self {
        Self {
            discard_buffer_size: 32 * 1024,
            seek_stored_entries: true,
        }
    }
}

impl From<ZipSettingsBuilder> for ZipSettings {
    fn from(value: ZipSettingsBuilder) -> Self {
        value.build()
    }
}

/// Builder to construct a [`ZipSettings`] instance.
#[derive(Clone, Debug)]
pub struct ZipSettingsBuilder(ZipSettings);

impl ZipSettingsBuilder {
    /// Turn this builder into a [`ZipSettings`] instance.
    pub fn build(self) -> ZipSettings {
        self.0
    }

    /// See [`ZipSettings::discard_buffer_size`].
    pub fn discard_buffer_size(mut self, discard_buffer_size: usize) -> Self {
        self.0.discard_buffer_size = discard_buffer_size;
        self
    }

    /// See [`ZipSettings::seek_stored_entries`].
    pub fn seek_stored_entries(mut self, seek_stored_entries: bool) -> Self {
        self.0.seek_stored_entries = seek_stored_entries;
        self
    }
}
