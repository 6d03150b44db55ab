use crate::archive::zip::cursor::ZipCursor;
use crate::archive::zip::ZipShared;
use crate::errors::{AccessError, ReadError, ReadResult};
use crate::media_type::MediaType;
use crate::resource::{self, ArchiveProperties, Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use crate::util::uri::RelativeUrl;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// How the content of a [`ZipEntry`] is stored within the archive.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryCompression {
    /// Uncompressed.
    Stored,
    /// Compressed with raw deflate.
    Deflated,
    /// Compressed with an unsupported method, or encrypted with ZIP encryption.
    ///
    /// Reading the entry fails with [`ReadError::UnsupportedOperation`].
    Unsupported(String),
}

/// Metadata of a file entry within a ZIP archive, read from the central directory.
#[derive(Clone, Debug)]
pub struct ZipEntry {
    pub(crate) path: RelativeUrl,
    pub(crate) uncompressed_length: u64,
    pub(crate) compressed_length: Option<u64>,
    pub(crate) compression: EntryCompression,
    pub(crate) header_offset: u64,
}

impl ZipEntry {
    /// The normalized path of the entry.
    pub fn path(&self) -> &RelativeUrl {
        &self.path
    }

    /// The length of the content once decompressed.
    pub fn uncompressed_length(&self) -> u64 {
        self.uncompressed_length
    }

    /// The length of the compressed content,
    /// present only if the entry is actually compressed.
    pub fn compressed_length(&self) -> Option<u64> {
        self.compressed_length
    }

    /// The compression method of the entry.
    pub fn compression(&self) -> &EntryCompression {
        &self.compression
    }

    /// The number of bytes the content occupies within the archive.
    pub(crate) fn stored_length(&self) -> u64 {
        self.compressed_length.unwrap_or(self.uncompressed_length)
    }
}

/// A [`Resource`] reading an entry of a [`ZipContainer`](super::ZipContainer).
///
/// Each resource owns its own cursor, so resources over the same entry
/// never interfere with each other.
/// Reads against the same resource are serialized.
///
/// Ranged reads within a compressed entry only decompress up to the end of the range.
/// Reading sequentially forward reuses the open cursor,
/// while reading backward decompresses from the start of the entry again.
pub struct ZipEntryResource {
    shared: Arc<ZipShared>,
    entry: Arc<ZipEntry>,
    cursor: Arc<Mutex<ZipCursor>>,
    closed: Arc<CloseFlag>,
}

impl ZipEntryResource {
    pub(crate) fn new(shared: Arc<ZipShared>, entry: Arc<ZipEntry>) -> Self {
        let cursor = ZipCursor::new(shared.source.clone(), shared.settings.clone());

        Self {
            shared,
            entry,
            cursor: Arc::new(Mutex::new(cursor)),
            closed: Arc::new(CloseFlag::new()),
        }
    }

    /// The metadata of the entry.
    pub fn entry(&self) -> &ZipEntry {
        &self.entry
    }

    fn ensure_open(&self) -> ReadResult<()> {
        self.shared.closed.ensure_open()?;
        self.closed.ensure_open()
    }
}

#[async_trait]
impl Resource for ZipEntryResource {
    fn href(&self) -> Option<&str> {
        Some(self.entry.path.as_str())
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        let mut properties = ResourceProperties::new();

        properties.set_filename(self.entry.path.filename());
        if let Some(media_type) = MediaType::for_path(self.entry.path.as_str()) {
            properties.set_media_type(&media_type);
        }
        properties.set_archive(ArchiveProperties {
            entry_length: self.entry.stored_length(),
            is_entry_compressed: self.entry.compressed_length.is_some(),
        });
        Ok(properties)
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.ensure_open()?;
        Ok(Some(self.entry.uncompressed_length))
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.ensure_open()?;
        let range = resource::clamp_range(range, self.entry.uncompressed_length);

        if range.is_empty() {
            return Ok(Bytes::new());
        }

        let shared = self.shared.clone();
        let entry = self.entry.clone();
        let cursor = self.cursor.clone();
        let closed = self.closed.clone();
        let path = self.shared.source.path().map(Path::to_path_buf);

        // The task runs to completion even if this future is dropped,
        // so the cursor is never left partially consumed.
        tokio::task::spawn_blocking(move || -> ReadResult<Bytes> {
            let mut cursor = cursor.lock();
            // Closed while waiting for the lock
            if shared.closed.is_closed() || closed.is_closed() {
                cursor.close_entry();
                return Err(AccessError::Closed.into());
            }

            let result = cursor.read(&entry, range);
            if shared.closed.is_closed() || closed.is_closed() {
                cursor.close_entry();
            }
            result
        })
        .await
        .map_err(|error| ReadError::io(io::Error::other(error), path))?
    }

    async fn close(&self) {
        if self.closed.close() {
            // An in-flight read drops the cursor itself once finished
            if let Some(mut cursor) = self.cursor.try_lock() {
                cursor.close_entry();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::archive::zip::ZipContainer;
    use crate::container::Container;
    use crate::resource::Resource;
    use std::io::Write;
    use zip::CompressionMethod;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));

        for (name, content, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_properties() {
        let content = b"lorem ipsum ".repeat(100);
        let bytes = zip_bytes(&[
            ("OEBPS/c1.xhtml", content.as_slice(), CompressionMethod::Deflated),
            ("mimetype", &b"application/epub+zip"[..], CompressionMethod::Stored),
        ]);
        let container = ZipContainer::read(bytes).unwrap();

        let compressed = container.get("OEBPS/c1.xhtml").unwrap();
        let compressed = compressed.properties().await.unwrap();
        let archive = compressed.archive().unwrap();
        assert!(archive.is_entry_compressed);
        assert!(archive.entry_length < content.len() as u64);
        assert_eq!(Some("c1.xhtml"), compressed.filename());

        let stored = container.get("mimetype").unwrap().properties().await.unwrap();
        let archive = stored.archive().unwrap();
        assert!(!archive.is_entry_compressed);
        assert_eq!(20, archive.entry_length);
    }

    #[tokio::test]
    async fn test_cursor_dropped_on_close() {
        let content = b"abc".repeat(50);
        let bytes = zip_bytes(&[("a.txt", content.as_slice(), CompressionMethod::Deflated)]);
        let container = ZipContainer::read(bytes).unwrap();
        let resource = super::ZipEntryResource::new(
            container.shared.clone(),
            container.metadata.values().next().unwrap().clone(),
        );

        assert_eq!(&b"cab"[..], resource.read(Some(2..5)).await.unwrap());
        assert!(resource.cursor.lock().is_open());

        resource.close().await;
        assert!(!resource.cursor.lock().is_open());
        assert!(resource.read(Some(0..1)).await.unwrap_err().is_access());
    }
}
