use crate::archive::errors::ArchiveError;
use crate::archive::zip::entry::{EntryCompression, ZipEntry};
use crate::archive::zip::ZipSettings;
use crate::archive::{ArchiveReader, ArchiveSource};
use crate::errors::{DecodingError, ReadError, ReadResult};
use bytes::Bytes;
use flate2::read::DeflateDecoder;
use std::io::{self, Read, Seek, SeekFrom, Take};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x03\x04";
const LOCAL_HEADER_LENGTH: usize = 30;
const MAX_PREALLOCATION: u64 = 1 << 20;

type RawStream = Take<Box<dyn ArchiveReader>>;

enum EntryStream {
    Stored(RawStream),
    Deflated(DeflateDecoder<RawStream>),
}

impl EntryStream {
    fn is_deflated(&self) -> bool {
        matches!(self, Self::Deflated(_))
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stored(stream) => stream.read(buf),
            Self::Deflated(stream) => stream.read(buf),
        }
    }
}

/// An entry opened for sequential reading.
struct OpenEntry {
    header_offset: u64,
    data_start: u64,
    /// Offset within the uncompressed content.
    offset: u64,
    stream: EntryStream,
}

/// A forward-only reader over one entry at a time, with emulated seeking.
///
/// Seeking forward within a compressed entry decompresses and discards
/// the bytes in between; seeking backward re-opens the entry from its start.
/// Stored entries are seeked directly unless
/// [`ZipSettings::seek_stored_entries`] is disabled.
pub(crate) struct ZipCursor {
    source: ArchiveSource,
    settings: ZipSettings,
    open: Option<OpenEntry>,
}

impl ZipCursor {
    pub(crate) fn new(source: ArchiveSource, settings: ZipSettings) -> Self {
        Self {
            source,
            settings,
            open: None,
        }
    }

    /// Returns `true` if an entry is currently open.
    pub(crate) fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Reads `range` of the uncompressed content of `entry`.
    ///
    /// `range` must already be clamped to the entry length.
    /// On failure the open entry is dropped,
    /// so the next read starts from a known state.
    pub(crate) fn read(&mut self, entry: &ZipEntry, range: Range<u64>) -> ReadResult<Bytes> {
        let result = self
            .open_entry(entry, range.start)
            .and_then(|()| self.read_from_current_offset(range.end - range.start));

        if result.is_err() {
            self.close_entry();
        }
        result
    }

    /// Positions the cursor at `offset` within the uncompressed content of `entry`.
    pub(crate) fn open_entry(&mut self, entry: &ZipEntry, offset: u64) -> ReadResult<()> {
        if let EntryCompression::Unsupported(method) = &entry.compression {
            return Err(ReadError::UnsupportedOperation(format!(
                "zip entry `{}` uses unsupported compression: {method}",
                entry.path
            )));
        }

        let reusable = self
            .open
            .as_ref()
            .is_some_and(|open| open.header_offset == entry.header_offset);

        let seekable =
            entry.compression == EntryCompression::Stored && self.settings.seek_stored_entries;

        if reusable && seekable {
            return self.seek_stored(entry, offset);
        }
        if !reusable || self.open.as_ref().is_some_and(|open| open.offset > offset) {
            self.close_entry();
        }

        if self.open.is_none() {
            tracing::debug!(entry = %entry.path, offset, "opening zip entry cursor");
            let open = self.open_fresh(entry)?;
            self.open = Some(open);

            if seekable {
                return self.seek_stored(entry, offset);
            }
        }
        self.skip_to(offset)
    }

    /// Reads up to `length` bytes from the current offset.
    ///
    /// Fewer bytes are returned only at the end of the entry.
    pub(crate) fn read_from_current_offset(&mut self, length: u64) -> ReadResult<Bytes> {
        let path = self.source.path().map(Path::to_path_buf);
        let Some(open) = self.open.as_mut() else {
            return Err(ReadError::UnsupportedOperation(
                "no zip entry is open".to_owned(),
            ));
        };

        let deflated = open.stream.is_deflated();
        // Central directory lengths may be bogus
        let mut buf = Vec::with_capacity(length.min(MAX_PREALLOCATION) as usize);
        let read = (&mut open.stream)
            .take(length)
            .read_to_end(&mut buf)
            .map_err(|error| stream_error(error, deflated, path))?;

        open.offset += read as u64;
        tracing::trace!(read, offset = open.offset, "read from zip entry");
        Ok(Bytes::from(buf))
    }

    /// Drops the open entry, if any.
    pub(crate) fn close_entry(&mut self) {
        self.open = None;
    }

    fn open_fresh(&self, entry: &ZipEntry) -> ReadResult<OpenEntry> {
        let path = self.source.path().map(Path::to_path_buf);
        let io_error =
            |error: io::Error| ReadError::from(ArchiveError::reading(error, path.clone()));
        let mut reader = self.source.open()?;

        reader
            .seek(SeekFrom::Start(entry.header_offset))
            .map_err(io_error)?;

        let mut header = [0; LOCAL_HEADER_LENGTH];
        reader.read_exact(&mut header).map_err(io_error)?;

        if header[..4] != LOCAL_HEADER_SIGNATURE {
            return Err(DecodingError::Archive(format!(
                "invalid local header for zip entry `{}`",
                entry.path
            ))
            .into());
        }
        let name_length = u16::from_le_bytes([header[26], header[27]]) as u64;
        let extra_length = u16::from_le_bytes([header[28], header[29]]) as u64;
        let data_start =
            entry.header_offset + LOCAL_HEADER_LENGTH as u64 + name_length + extra_length;

        reader.seek(SeekFrom::Start(data_start)).map_err(io_error)?;
        let raw = reader.take(entry.stored_length());

        let stream = match entry.compression {
            EntryCompression::Deflated => EntryStream::Deflated(DeflateDecoder::new(raw)),
            _ => EntryStream::Stored(raw),
        };
        Ok(OpenEntry {
            header_offset: entry.header_offset,
            data_start,
            offset: 0,
            stream,
        })
    }

    fn seek_stored(&mut self, entry: &ZipEntry, offset: u64) -> ReadResult<()> {
        let path = self.source.path().map(Path::to_path_buf);
        let Some(open) = self.open.as_mut() else {
            return Ok(());
        };
        let EntryStream::Stored(raw) = &mut open.stream else {
            return Ok(());
        };

        raw.get_mut()
            .seek(SeekFrom::Start(open.data_start + offset))
            .map_err(|error| ReadError::from(ArchiveError::reading(error, path)))?;
        raw.set_limit(entry.stored_length().saturating_sub(offset));
        open.offset = offset;
        Ok(())
    }

    fn skip_to(&mut self, offset: u64) -> ReadResult<()> {
        let path = self.source.path().map(Path::to_path_buf);
        let Some(open) = self.open.as_mut() else {
            return Ok(());
        };
        let mut remaining = offset - open.offset;

        if remaining == 0 {
            return Ok(());
        }
        tracing::trace!(from = open.offset, to = offset, "discarding zip entry bytes");

        let deflated = open.stream.is_deflated();
        let buffer_size = self.settings.discard_buffer_size.max(1) as u64;
        let mut discard = vec![0; buffer_size.min(remaining) as usize];

        while remaining > 0 {
            let chunk = discard.len().min(remaining as usize);
            let read = match open.stream.read(&mut discard[..chunk]) {
                Ok(0) => {
                    return Err(DecodingError::Archive(format!(
                        "zip entry ended {remaining} bytes before offset {offset}"
                    ))
                    .into());
                }
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(stream_error(error, deflated, path)),
            };
            remaining -= read as u64;
            open.offset += read as u64;
        }
        Ok(())
    }
}

/// Classifies a failed read of an entry stream.
fn stream_error(error: io::Error, deflated: bool, path: Option<PathBuf>) -> ReadError {
    match error.kind() {
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData if deflated => {
            DecodingError::Inflate(Arc::new(error)).into()
        }
        _ => ArchiveError::reading(error, path).into(),
    }
}
