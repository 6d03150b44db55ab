use crate::errors::ReadResult;
use crate::resource::{Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;
use std::path::Path;

/// A pass-through [`Resource`] decorator.
///
/// Everything is forwarded to the wrapped resource, except:
/// - [`href`](Resource::href), when replaced with [`ProxyResource::with_href`].
/// - [`properties`](Resource::properties), overlaid with
///   [`ProxyResource::with_properties`].
/// - [`close`](Resource::close), when disabled with [`ProxyResource::forward_close`]
///   for a resource shared with other owners.
///
/// A closed proxy fails to read, whether or not the wrapped resource was closed.
pub struct ProxyResource<R> {
    inner: R,
    href: Option<String>,
    properties: ResourceProperties,
    forward_close: bool,
    closed: CloseFlag,
}

impl<R: Resource> ProxyResource<R> {
    /// Wraps `inner` without any overrides.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            href: None,
            properties: ResourceProperties::new(),
            forward_close: true,
            closed: CloseFlag::new(),
        }
    }

    /// Replaces the href reported by the wrapped resource.
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Merges `properties` over those reported by the wrapped resource.
    pub fn with_properties(mut self, properties: ResourceProperties) -> Self {
        self.properties.merge(properties);
        self
    }

    /// Whether [`Resource::close`] reaches the wrapped resource.
    ///
    /// Default: `true`
    pub fn forward_close(mut self, forward_close: bool) -> Self {
        self.forward_close = forward_close;
        self
    }

    /// The wrapped resource.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwraps the proxy, returning the wrapped resource.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R: Resource> Resource for ProxyResource<R> {
    fn href(&self) -> Option<&str> {
        self.href.as_deref().or_else(|| self.inner.href())
    }

    fn source_path(&self) -> Option<&Path> {
        self.inner.source_path()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        let mut properties = self.inner.properties().await?;
        properties.merge(self.properties.clone());
        Ok(properties)
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.closed.ensure_open()?;
        self.inner.estimated_length().await
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.closed.ensure_open()?;
        self.inner.read(range).await
    }

    async fn close(&self) {
        if self.closed.close() && self.forward_close {
            self.inner.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProxyResource;
    use crate::media_type::MediaType;
    use crate::resource::{BufferResource, Resource, ResourceProperties};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_overrides() {
        let mut inner_properties = ResourceProperties::new();
        inner_properties.set_filename("inner.bin");
        inner_properties.set_media_type(&MediaType::BINARY);

        let mut overlay = ResourceProperties::new();
        overlay.set_media_type(&MediaType::from("text/css"));

        let inner = BufferResource::new("body {}")
            .with_href("inner.bin")
            .with_properties(inner_properties);
        let proxy = ProxyResource::new(inner)
            .with_href("OEBPS/style.css")
            .with_properties(overlay);

        let properties = proxy.properties().await.unwrap();
        assert_eq!(Some("OEBPS/style.css"), proxy.href());
        assert_eq!(Some("inner.bin"), properties.filename());
        assert_eq!(Some(MediaType::from("text/css")), properties.media_type());
        assert_eq!(&b"dy"[..], proxy.read(Some(2..4)).await.unwrap());
    }

    #[tokio::test]
    async fn test_close_not_forwarded() {
        let shared = Arc::new(BufferResource::new("shared"));
        let proxy = ProxyResource::new(shared.clone()).forward_close(false);

        proxy.close().await;
        assert_eq!(&b"shared"[..], shared.read(None).await.unwrap());
        assert!(proxy.read(None).await.unwrap_err().is_access());
        assert!(proxy.estimated_length().await.unwrap_err().is_access());

        ProxyResource::new(shared.clone()).close().await;
        assert!(shared.read(None).await.unwrap_err().is_access());
    }
}
