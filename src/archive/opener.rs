//! Openers turning a [`Resource`] into a [`Container`].

use crate::archive::directory::DirectoryContainer;
use crate::archive::errors::{ArchiveError, ArchiveOpenError, ArchiveSniffOpenError};
use crate::archive::zip::{self, ZipContainer, ZipSettings};
use crate::container::Container;
use crate::errors::{ReadError, ReadResult};
use crate::media_type::MediaType;
use crate::resource::{Resource, ResourceExt};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A [`Container`] along with the format it was opened as.
pub struct ContainerAsset {
    /// The format of the opened archive,
    /// which may be more specific than the one requested when sniffed.
    pub media_type: MediaType,
    /// The opened container.
    pub container: Box<dyn Container>,
}

impl std::fmt::Debug for ContainerAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerAsset")
            .field("media_type", &self.media_type)
            .field("entries", &self.container.entries().len())
            .finish()
    }
}

/// Opens a [`Resource`] holding an archive as a [`Container`].
#[async_trait]
pub trait ArchiveOpener: Send + Sync {
    /// Opens `resource` as the known format `media_type`.
    ///
    /// # Errors
    /// - [`ArchiveOpenError::FormatNotSupported`]: When the opener does not handle `media_type`.
    /// - [`ArchiveOpenError::Reading`]: When the format is handled, but reading failed.
    async fn open(
        &self,
        resource: Arc<dyn Resource>,
        media_type: &MediaType,
    ) -> Result<ContainerAsset, ArchiveOpenError>;

    /// Inspects the content of `resource` to find out whether the opener handles it,
    /// then opens it.
    ///
    /// # Errors
    /// - [`ArchiveSniffOpenError::FormatNotRecognized`]: When the content is not recognized.
    /// - [`ArchiveSniffOpenError::Reading`]: When the content is recognized, but reading failed.
    async fn sniff_open(
        &self,
        resource: Arc<dyn Resource>,
    ) -> Result<ContainerAsset, ArchiveSniffOpenError>;
}

/// Opens ZIP archives, `application/zip` and any `+zip` media type.
///
/// Resources backed by a local file are opened from their path.
/// Otherwise, the full content is read into memory first.
#[derive(Clone, Debug, Default)]
pub struct ZipArchiveOpener {
    settings: ZipSettings,
}

impl ZipArchiveOpener {
    /// Creates an opener using default [`ZipSettings`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an opener using the specified [`ZipSettings`].
    pub fn with_settings(settings: impl Into<ZipSettings>) -> Self {
        Self {
            settings: settings.into(),
        }
    }

    async fn open_zip(&self, resource: &dyn Resource) -> ReadResult<ZipContainer> {
        let settings = self.settings.clone();

        if let Some(path) = resource.source_path() {
            let path = path.to_path_buf();
            return blocking(Some(path.clone()), move || {
                ZipContainer::open_with(path, settings)
            })
            .await;
        }

        let bytes = resource.read(None).await?;
        blocking(None, move || ZipContainer::read_with(bytes, settings)).await
    }
}

/// Detects the more specific format of a ZIP archive
/// from its `mimetype` entry, as EPUB and its derivatives carry.
async fn sniff_zip_media_type(container: &dyn Container) -> MediaType {
    let Some(mimetype) = container.get("mimetype") else {
        return MediaType::ZIP;
    };
    match mimetype.read_as_string().await {
        Ok(value) if MediaType::from(value.as_str()).is_zip() => MediaType::from(value),
        _ => MediaType::ZIP,
    }
}

#[async_trait]
impl ArchiveOpener for ZipArchiveOpener {
    async fn open(
        &self,
        resource: Arc<dyn Resource>,
        media_type: &MediaType,
    ) -> Result<ContainerAsset, ArchiveOpenError> {
        if !media_type.is_zip() {
            return Err(ArchiveOpenError::FormatNotSupported(media_type.clone()));
        }
        let container = self.open_zip(resource.as_ref()).await?;

        Ok(ContainerAsset {
            media_type: media_type.clone(),
            container: Box::new(container),
        })
    }

    async fn sniff_open(
        &self,
        resource: Arc<dyn Resource>,
    ) -> Result<ContainerAsset, ArchiveSniffOpenError> {
        if directory_of(resource.as_ref()).is_some() {
            return Err(ArchiveSniffOpenError::FormatNotRecognized);
        }
        let signature = resource.read(Some(0..4)).await?;

        if !zip::is_zip_signature(&signature) {
            return Err(ArchiveSniffOpenError::FormatNotRecognized);
        }
        let container = self.open_zip(resource.as_ref()).await?;
        let media_type = sniff_zip_media_type(&container).await;

        Ok(ContainerAsset {
            media_type,
            container: Box::new(container),
        })
    }
}

/// Opens exploded archives, directories on the local filesystem
/// identified by [`MediaType::DIRECTORY`].
#[derive(Clone, Debug, Default)]
pub struct ExplodedArchiveOpener;

impl ExplodedArchiveOpener {
    async fn open_directory(path: &Path) -> ReadResult<DirectoryContainer> {
        let path = path.to_path_buf();
        blocking(Some(path.clone()), move || DirectoryContainer::new(path)).await
    }
}

fn directory_of(resource: &dyn Resource) -> Option<&Path> {
    resource.source_path().filter(|path| path.is_dir())
}

#[async_trait]
impl ArchiveOpener for ExplodedArchiveOpener {
    async fn open(
        &self,
        resource: Arc<dyn Resource>,
        media_type: &MediaType,
    ) -> Result<ContainerAsset, ArchiveOpenError> {
        let directory = directory_of(resource.as_ref());

        let Some(path) = directory.filter(|_| *media_type == MediaType::DIRECTORY) else {
            return Err(ArchiveOpenError::FormatNotSupported(media_type.clone()));
        };
        let container = Self::open_directory(path).await?;

        Ok(ContainerAsset {
            media_type: MediaType::DIRECTORY,
            container: Box::new(container),
        })
    }

    async fn sniff_open(
        &self,
        resource: Arc<dyn Resource>,
    ) -> Result<ContainerAsset, ArchiveSniffOpenError> {
        let Some(path) = directory_of(resource.as_ref()) else {
            return Err(ArchiveSniffOpenError::FormatNotRecognized);
        };
        let container = Self::open_directory(path).await?;

        Ok(ContainerAsset {
            media_type: MediaType::DIRECTORY,
            container: Box::new(container),
        })
    }
}

/// An [`ArchiveOpener`] trying each of its openers in order, the first match winning.
///
/// An opener not supporting or not recognizing the format is skipped.
/// Any other failure is returned immediately.
///
/// # Examples
/// ```
/// # use rbook_fetch::archive::opener::{ArchiveOpener, CompositeArchiveOpener};
/// # use rbook_fetch::errors::ArchiveOpenError;
/// # use rbook_fetch::resource::BufferResource;
/// # use rbook_fetch::MediaType;
/// # use std::sync::Arc;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let opener = CompositeArchiveOpener::default();
/// let resource = Arc::new(BufferResource::new("%PDF-1.7"));
///
/// let result = opener.open(resource, &MediaType::from("application/pdf")).await;
/// assert!(matches!(result, Err(ArchiveOpenError::FormatNotSupported(_))));
/// # }
/// ```
pub struct CompositeArchiveOpener {
    openers: Vec<Box<dyn ArchiveOpener>>,
}

impl CompositeArchiveOpener {
    /// Creates an opener trying `openers` in order.
    pub fn new(openers: Vec<Box<dyn ArchiveOpener>>) -> Self {
        Self { openers }
    }
}

impl Default for CompositeArchiveOpener {
    /// [`ZipArchiveOpener`] followed by [`ExplodedArchiveOpener`].
    fn default() -> Self {
        Self::new(vec![
            Box::new(ZipArchiveOpener::default()),
            Box::new(ExplodedArchiveOpener),
        ])
    }
}

#[async_trait]
impl ArchiveOpener for CompositeArchiveOpener {
    async fn open(
        &self,
        resource: Arc<dyn Resource>,
        media_type: &MediaType,
    ) -> Result<ContainerAsset, ArchiveOpenError> {
        for opener in &self.openers {
            match opener.open(resource.clone(), media_type).await {
                Err(ArchiveOpenError::FormatNotSupported(_)) => continue,
                result => return result,
            }
        }
        Err(ArchiveOpenError::FormatNotSupported(media_type.clone()))
    }

    async fn sniff_open(
        &self,
        resource: Arc<dyn Resource>,
    ) -> Result<ContainerAsset, ArchiveSniffOpenError> {
        for opener in &self.openers {
            match opener.sniff_open(resource.clone()).await {
                Err(ArchiveSniffOpenError::FormatNotRecognized) => continue,
                result => return result,
            }
        }
        Err(ArchiveSniffOpenError::FormatNotRecognized)
    }
}

/// Runs a blocking archive operation off the async runtime.
async fn blocking<T, F>(path: Option<PathBuf>, operation: F) -> ReadResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|error| ReadError::io(io::Error::other(error), path))?
        .map_err(ReadError::from)
}
