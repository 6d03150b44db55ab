use crate::errors::ReadResult;
use crate::resource::{self, Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;
use tokio::sync::OnceCell;

/// A transformation applied to the full content of a resource.
///
/// Implemented for any `Fn(Bytes) -> ReadResult<Bytes>`, so a plain closure
/// may be handed to [`TransformingResource`].
#[async_trait]
pub trait Transform: Send + Sync {
    /// Turns the full content into the transformed content.
    async fn transform(&self, content: Bytes) -> ReadResult<Bytes>;
}

#[async_trait]
impl<F> Transform for F
where
    F: Fn(Bytes) -> ReadResult<Bytes> + Send + Sync,
{
    async fn transform(&self, content: Bytes) -> ReadResult<Bytes> {
        self(content)
    }
}

/// A [`Resource`] decorator serving the output of a [`Transform`]
/// over the full content of the wrapped resource.
///
/// The transformation runs once; its outcome, success or failure, is memoized.
/// Ranged reads slice the transformed content.
///
/// # Examples
/// ```
/// # use bytes::Bytes;
/// # use rbook_fetch::errors::ReadResult;
/// # use rbook_fetch::resource::{BufferResource, Resource, TransformingResource};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> rbook_fetch::errors::ReadResult<()> {
/// let uppercase = |bytes: Bytes| -> ReadResult<Bytes> {
///     Ok(Bytes::from(bytes.to_ascii_uppercase()))
/// };
/// let resource = TransformingResource::new(BufferResource::new("chapter"), uppercase);
///
/// assert_eq!(&b"HAP"[..], resource.read(Some(1..4)).await?);
/// assert_eq!(Some(7), resource.estimated_length().await?);
/// # Ok(())
/// # }
/// ```
pub struct TransformingResource<R, T> {
    inner: R,
    transform: T,
    output: OnceCell<ReadResult<Bytes>>,
    closed: CloseFlag,
}

impl<R: Resource, T: Transform> TransformingResource<R, T> {
    /// Wraps `inner`, serving its content passed through `transform`.
    pub fn new(inner: R, transform: T) -> Self {
        Self {
            inner,
            transform,
            output: OnceCell::new(),
            closed: CloseFlag::new(),
        }
    }

    /// The wrapped resource.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn output(&self) -> ReadResult<Bytes> {
        self.output
            .get_or_init(|| async {
                let content = self.inner.read(None).await?;
                self.transform.transform(content).await
            })
            .await
            .clone()
    }
}

#[async_trait]
impl<R: Resource, T: Transform> Resource for TransformingResource<R, T> {
    fn href(&self) -> Option<&str> {
        self.inner.href()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        self.inner.properties().await
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.closed.ensure_open()?;
        Ok(Some(self.output().await?.len() as u64))
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.closed.ensure_open()?;
        Ok(resource::slice(&self.output().await?, range))
    }

    async fn close(&self) {
        if self.closed.close() {
            self.inner.close().await;
        }
    }
}
