use crate::errors::{ReadError, ReadResult};
use crate::resource::{Resource, ResourceProperties};
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;

/// A [`Resource`] whose every read fails with the same error.
///
/// Handy to hand out a resource for content that is known to be unreachable,
/// deferring the failure to the consumer.
#[derive(Clone, Debug)]
pub struct FailureResource {
    href: Option<String>,
    error: ReadError,
}

impl FailureResource {
    /// Creates a resource always failing with `error`.
    pub fn new(error: impl Into<ReadError>) -> Self {
        Self {
            href: None,
            error: error.into(),
        }
    }

    /// Sets the href the resource is addressed by.
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// The error returned by every read.
    pub fn error(&self) -> &ReadError {
        &self.error
    }
}

#[async_trait]
impl Resource for FailureResource {
    fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        Err(self.error.clone())
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        Err(self.error.clone())
    }

    async fn read(&self, _range: Option<Range<u64>>) -> ReadResult<Bytes> {
        Err(self.error.clone())
    }
}
