//! Format-agnostic, lazily read [`Resource`] types.
//!
//! # Overview
//! A [`Resource`] is a uniform handle to one logical piece of content,
//! readable in whole or in part by byte range.
//!
//! ## Backing stores
//! - [`BufferResource`]: In-memory bytes.
//! - [`FileResource`]: A file on the local filesystem.
//! - [`HttpResource`]: A remote resource, ranged reads become `Range` requests
//!   (requires the `http` feature).
//! - [`ZipEntryResource`](crate::archive::zip::ZipEntryResource): An entry within a ZIP archive.
//!
//! ## Decorators
//! - [`CachingResource`]: Reads everything once, then serves from memory.
//! - [`TransformingResource`]: Serves the output of a [`Transform`] over the content.
//! - [`ProxyResource`]: Forwards everything, optionally overriding the href and properties.
//! - [`LazyResource`]: Defers constructing the real resource until first use.
//! - [`FailureResource`]: Always fails with a fixed error.

mod buffer;
mod caching;
mod failure;
mod file;
#[cfg(feature = "http")]
mod http;
mod lazy;
mod properties;
mod proxy;
mod transforming;

pub use self::buffer::BufferResource;
pub use self::caching::CachingResource;
pub use self::failure::FailureResource;
pub use self::file::FileResource;
#[cfg(feature = "http")]
pub use self::http::{HttpResource, HttpSettings, HttpSettingsBuilder};
pub use self::lazy::LazyResource;
pub use self::properties::{ArchiveProperties, ResourceProperties};
pub use self::proxy::ProxyResource;
pub use self::transforming::{Transform, TransformingResource};

use crate::errors::{DecodingError, ReadResult};
use crate::util;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// A lazily read handle to the content of a publication resource.
///
/// # Ranges
/// A range passed to [`read`](Self::read) is clamped to `[0, length)`;
/// requesting bytes past the end is never an error.
/// `None` reads everything.
///
/// # Concurrency
/// Different resource instances never share state, so they may be read concurrently.
/// Reads against the same instance are serialized internally when the backing store is stateful.
///
/// # Closing
/// [`close`](Self::close) is idempotent.
/// Once closed, reads fail with [`AccessError::Closed`](crate::errors::AccessError::Closed).
///
/// # Examples
/// ```
/// # use rbook_fetch::resource::{BufferResource, Resource};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> rbook_fetch::errors::ReadResult<()> {
/// let resource = BufferResource::new("Hello, World!").with_href("hello.txt");
///
/// assert_eq!(Some(13), resource.estimated_length().await?);
/// assert_eq!(&b"World"[..], resource.read(Some(7..12)).await?);
/// // Clamped to the end of the content
/// assert_eq!(&b"!"[..], resource.read(Some(12..1000)).await?);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Resource: Send + Sync {
    /// The href this resource was fetched through, if any.
    fn href(&self) -> Option<&str>;

    /// The location of the backing file on the local filesystem, if any.
    fn source_path(&self) -> Option<&Path> {
        None
    }

    /// Metadata describing the resource.
    async fn properties(&self) -> ReadResult<ResourceProperties> {
        Ok(ResourceProperties::new())
    }

    /// The length of the content in bytes, or [`None`] if it is unknown
    /// without reading the content.
    async fn estimated_length(&self) -> ReadResult<Option<u64>>;

    /// Reads the bytes within the given `range`,
    /// or the entire content if `range` is [`None`].
    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes>;

    /// Releases any handles owned by the resource.
    async fn close(&self) {}
}

#[async_trait]
impl<R: Resource + ?Sized> Resource for Box<R> {
    fn href(&self) -> Option<&str> {
        (**self).href()
    }

    fn source_path(&self) -> Option<&Path> {
        (**self).source_path()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        (**self).properties().await
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        (**self).estimated_length().await
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        (**self).read(range).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

#[async_trait]
impl<R: Resource + ?Sized> Resource for Arc<R> {
    fn href(&self) -> Option<&str> {
        (**self).href()
    }

    fn source_path(&self) -> Option<&Path> {
        (**self).source_path()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        (**self).properties().await
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        (**self).estimated_length().await
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        (**self).read(range).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Convenience reads built on top of [`Resource::read`].
pub trait ResourceExt: Resource {
    /// Reads the entire content as a string.
    ///
    /// UTF-16 content with a byte order mark is converted to UTF-8.
    ///
    /// # Errors
    /// [`DecodingError::Utf`]: When the content is not valid text.
    fn read_as_string(&self) -> impl Future<Output = ReadResult<String>> + Send {
        async move {
            let bytes = self.read(None).await?;
            util::utf::into_utf8_str(&bytes).map_err(|error| DecodingError::Utf(error).into())
        }
    }

    /// Reads the entire content as JSON, deserialized into `T`.
    ///
    /// # Errors
    /// [`DecodingError::Json`]: When the content is not valid JSON for `T`.
    ///
    /// # Examples
    /// ```
    /// # use rbook_fetch::resource::{BufferResource, ResourceExt};
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> rbook_fetch::errors::ReadResult<()> {
    /// let resource = BufferResource::new(r#"{"readingOrder": ["c1.xhtml"]}"#);
    /// let json: serde_json::Value = resource.read_as_json().await?;
    ///
    /// assert_eq!("c1.xhtml", json["readingOrder"][0]);
    /// # Ok(())
    /// # }
    /// ```
    fn read_as_json<T: DeserializeOwned + Send>(
        &self,
    ) -> impl Future<Output = ReadResult<T>> + Send {
        async move {
            let text = self.read_as_string().await?;
            serde_json::from_str(&text).map_err(|error| DecodingError::from(error).into())
        }
    }
}

impl<R: Resource + ?Sized> ResourceExt for R {}

/// Clamps a requested range to `[0, length)`.
///
/// An inverted range yields an empty range.
pub(crate) fn clamp_range(range: Option<Range<u64>>, length: u64) -> Range<u64> {
    match range {
        None => 0..length,
        Some(range) => {
            let start = range.start.min(length);
            let end = range.end.min(length).max(start);
            start..end
        }
    }
}

/// Slices `bytes` by a requested range, clamping it to the available bytes.
pub(crate) fn slice(bytes: &Bytes, range: Option<Range<u64>>) -> Bytes {
    let range = clamp_range(range, bytes.len() as u64);
    bytes.slice(range.start as usize..range.end as usize)
}
