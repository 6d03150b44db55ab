use crate::errors::ReadResult;
use crate::resource::{Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

/// A [`Resource`] constructing the real resource on first use.
///
/// Closing never constructs the real resource,
/// and a closed resource fails to read without constructing it.
///
/// # Examples
/// ```
/// # use rbook_fetch::resource::{BufferResource, LazyResource, Resource};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> rbook_fetch::errors::ReadResult<()> {
/// let resource = LazyResource::new(|| {
///     Box::new(BufferResource::new("deferred")) as Box<dyn Resource>
/// });
/// assert!(!resource.is_initialized());
///
/// assert_eq!(&b"fer"[..], resource.read(Some(2..5)).await?);
/// assert!(resource.is_initialized());
/// # Ok(())
/// # }
/// ```
pub struct LazyResource<F> {
    factory: F,
    resource: OnceLock<Box<dyn Resource>>,
    closed: CloseFlag,
}

impl<F> LazyResource<F>
where
    F: Fn() -> Box<dyn Resource> + Send + Sync,
{
    /// Creates a resource deferring to the one returned by `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            resource: OnceLock::new(),
            closed: CloseFlag::new(),
        }
    }

    /// Returns `true` if the real resource has been constructed.
    pub fn is_initialized(&self) -> bool {
        self.resource.get().is_some()
    }

    fn resource(&self) -> &dyn Resource {
        self.resource.get_or_init(&self.factory).as_ref()
    }
}

#[async_trait]
impl<F> Resource for LazyResource<F>
where
    F: Fn() -> Box<dyn Resource> + Send + Sync,
{
    fn href(&self) -> Option<&str> {
        self.resource().href()
    }

    fn source_path(&self) -> Option<&Path> {
        self.resource().source_path()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        self.resource().properties().await
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.closed.ensure_open()?;
        self.resource().estimated_length().await
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.closed.ensure_open()?;
        self.resource().read(range).await
    }

    async fn close(&self) {
        if !self.closed.close() {
            return;
        }
        if let Some(resource) = self.resource.get() {
            resource.close().await;
        }
    }
}
