use crate::errors::{AccessError, ReadError, ReadResult};
use crate::media_type::MediaType;
use crate::resource::{self, Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

/// A [`Resource`] backed by a file on the local filesystem.
///
/// The file handle is opened on the first read and released on [`Resource::close`].
#[derive(Debug)]
pub struct FileResource {
    path: PathBuf,
    href: Option<String>,
    file: Mutex<Option<File>>,
    closed: CloseFlag,
    parent_closed: Option<Arc<CloseFlag>>,
}

impl FileResource {
    /// Creates a resource for the file at `path`.
    ///
    /// The file is not accessed until the resource is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            href: None,
            file: Mutex::new(None),
            closed: CloseFlag::new(),
            parent_closed: None,
        }
    }

    /// Sets the href the resource is addressed by.
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Shares the closed state of the container handing out this resource.
    pub(crate) fn with_parent_closed(mut self, parent_closed: Arc<CloseFlag>) -> Self {
        self.parent_closed = Some(parent_closed);
        self
    }

    /// The location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> ReadResult<()> {
        self.closed.ensure_open()?;
        match &self.parent_closed {
            Some(parent_closed) => parent_closed.ensure_open(),
            None => Ok(()),
        }
    }

    fn error(&self, source: io::Error) -> ReadError {
        match source.kind() {
            io::ErrorKind::NotFound => {
                AccessError::NotFound(self.path.to_string_lossy().into_owned()).into()
            }
            io::ErrorKind::PermissionDenied => {
                AccessError::Forbidden(self.path.to_string_lossy().into_owned()).into()
            }
            _ => ReadError::io(source, Some(self.path.clone())),
        }
    }

    async fn read_file(&self, file: &mut File, range: Option<Range<u64>>) -> io::Result<Bytes> {
        let length = file.metadata().await?.len();
        let range = resource::clamp_range(range, length);

        if range.is_empty() {
            return Ok(Bytes::new());
        }
        file.seek(SeekFrom::Start(range.start)).await?;

        let mut buf = vec![0; (range.end - range.start) as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

#[async_trait]
impl Resource for FileResource {
    fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    fn source_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        let mut properties = ResourceProperties::new();

        if let Some(filename) = self.path.file_name().and_then(|name| name.to_str()) {
            properties.set_filename(filename);
        }
        if let Some(media_type) = self.path.to_str().and_then(MediaType::for_path) {
            properties.set_media_type(&media_type);
        }
        Ok(properties)
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.ensure_open()?;

        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|error| self.error(error))?;
        Ok(metadata.is_file().then_some(metadata.len()))
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.ensure_open()?;
        let mut lock = self.file.lock().await;
        // Closed while waiting for the lock
        self.ensure_open()?;

        if lock.is_none() {
            tracing::trace!(path = ?self.path, "opening file handle");
            let file = File::open(&self.path)
                .await
                .map_err(|error| self.error(error))?;
            *lock = Some(file);
        }
        let Some(file) = lock.as_mut() else {
            return Err(AccessError::Closed.into());
        };

        match self.read_file(file, range).await {
            Ok(bytes) => Ok(bytes),
            Err(error) => {
                // The handle position is unknown; reopen on the next read
                *lock = None;
                Err(self.error(error))
            }
        }
    }

    async fn close(&self) {
        if self.closed.close() {
            self.file.lock().await.take();
        }
    }
}
