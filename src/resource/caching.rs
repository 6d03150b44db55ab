use crate::errors::ReadResult;
use crate::resource::{self, Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;
use std::path::Path;
use tokio::sync::OnceCell;

/// A [`Resource`] decorator reading the full content of the wrapped resource
/// on first access, then serving every length and read from memory.
///
/// The outcome of the first full read is memoized, including a failure;
/// a failing resource is never read twice.
///
/// The entire content is held in memory,
/// so this is unsuitable for resources that may be large.
pub struct CachingResource<R> {
    inner: R,
    cache: OnceCell<ReadResult<Bytes>>,
    closed: CloseFlag,
}

impl<R: Resource> CachingResource<R> {
    /// Wraps `inner`, caching its content on first read.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: OnceCell::new(),
            closed: CloseFlag::new(),
        }
    }

    /// The wrapped resource.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn content(&self) -> ReadResult<Bytes> {
        self.cache
            .get_or_init(|| async {
                tracing::trace!(href = ?self.inner.href(), "caching resource content");
                self.inner.read(None).await
            })
            .await
            .clone()
    }
}

#[async_trait]
impl<R: Resource> Resource for CachingResource<R> {
    fn href(&self) -> Option<&str> {
        self.inner.href()
    }

    fn source_path(&self) -> Option<&Path> {
        self.inner.source_path()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        self.inner.properties().await
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.closed.ensure_open()?;
        Ok(Some(self.content().await?.len() as u64))
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.closed.ensure_open()?;
        let content = self.content().await?;
        Ok(resource::slice(&content, range))
    }

    async fn close(&self) {
        if self.closed.close() {
            self.inner.close().await;
        }
    }
}
