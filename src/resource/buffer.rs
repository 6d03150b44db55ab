use crate::errors::ReadResult;
use crate::resource::{self, Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;

/// A [`Resource`] serving bytes held in memory.
#[derive(Debug)]
pub struct BufferResource {
    href: Option<String>,
    bytes: Bytes,
    properties: ResourceProperties,
    closed: CloseFlag,
}

impl BufferResource {
    /// Creates a resource from the given bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            href: None,
            bytes: bytes.into(),
            properties: ResourceProperties::new(),
            closed: CloseFlag::new(),
        }
    }

    /// Sets the href the resource is addressed by.
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Sets the properties reported by [`Resource::properties`].
    pub fn with_properties(mut self, properties: ResourceProperties) -> Self {
        self.properties = properties;
        self
    }
}

#[async_trait]
impl Resource for BufferResource {
    fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        Ok(self.properties.clone())
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.closed.ensure_open()?;
        Ok(Some(self.bytes.len() as u64))
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.closed.ensure_open()?;
        Ok(resource::slice(&self.bytes, range))
    }

    async fn close(&self) {
        self.closed.close();
    }
}
