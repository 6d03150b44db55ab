//! [`Container`] types grouping resources addressed by relative URL.
//!
//! - [`ZipContainer`](crate::archive::zip::ZipContainer): Entries of a ZIP archive.
//! - [`DirectoryContainer`](crate::archive::directory::DirectoryContainer):
//!   Files of an exploded archive on the local filesystem.
//! - [`SingleResourceContainer`]: A single resource at a fixed href.
//! - [`RoutingContainer`]: Dispatches to child containers by href.

mod routing;

pub use self::routing::{Route, RoutingContainer};

use crate::errors::AccessError;
use crate::resource::{FailureResource, ProxyResource, Resource};
use crate::util::sync::CloseFlag;
use crate::util::uri::RelativeUrl;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A set of [`Resource`] entries addressed by [`RelativeUrl`].
///
/// The entry set is discovered once, when the container is created,
/// and does not change afterward.
#[async_trait]
pub trait Container: Send + Sync {
    /// The location the container was opened from, if known.
    fn source_url(&self) -> Option<&str> {
        None
    }

    /// All entries of the container.
    fn entries(&self) -> &BTreeSet<RelativeUrl>;

    /// Returns the resource at `href`,
    /// or [`None`] if it is not an entry or the container is closed.
    ///
    /// `href` is percent-decoded and normalized before the lookup,
    /// and its query or fragment is ignored.
    /// Retrieving a resource is cheap; nothing is read until the resource is.
    fn get(&self, href: &str) -> Option<Box<dyn Resource>>;

    /// Releases any handles owned by the container.
    ///
    /// Resources already handed out by [`get`](Self::get) fail to read afterward.
    async fn close(&self) {}
}

#[async_trait]
impl<C: Container + ?Sized> Container for Box<C> {
    fn source_url(&self) -> Option<&str> {
        (**self).source_url()
    }

    fn entries(&self) -> &BTreeSet<RelativeUrl> {
        (**self).entries()
    }

    fn get(&self, href: &str) -> Option<Box<dyn Resource>> {
        (**self).get(href)
    }

    async fn close(&self) {
        (**self).close().await
    }
}

#[async_trait]
impl<C: Container + ?Sized> Container for Arc<C> {
    fn source_url(&self) -> Option<&str> {
        (**self).source_url()
    }

    fn entries(&self) -> &BTreeSet<RelativeUrl> {
        (**self).entries()
    }

    fn get(&self, href: &str) -> Option<Box<dyn Resource>> {
        (**self).get(href)
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Convenience lookups built on top of [`Container::get`].
pub trait ContainerExt: Container {
    /// Returns the resource at `href`, or a [`FailureResource`]
    /// failing with [`AccessError::NotFound`] if there is none.
    fn get_or_failure(&self, href: &str) -> Box<dyn Resource> {
        self.get(href).unwrap_or_else(|| {
            Box::new(
                FailureResource::new(AccessError::NotFound(href.to_owned())).with_href(href),
            )
        })
    }

    /// Returns `true` if `href` addresses an entry of the container.
    fn contains(&self, href: &str) -> bool {
        RelativeUrl::parse(href).is_some_and(|url| self.entries().contains(&url))
    }
}

impl<C: Container + ?Sized> ContainerExt for C {}

/// A [`Container`] holding a single resource at a fixed href.
///
/// Resources handed out share the held resource;
/// closing them has no effect until the container itself is closed.
pub struct SingleResourceContainer {
    entries: BTreeSet<RelativeUrl>,
    resource: Arc<dyn Resource>,
    closed: CloseFlag,
}

impl SingleResourceContainer {
    /// Creates a container holding `resource` at `href`.
    ///
    /// Returns [`None`] if `href` is not a valid relative URL.
    pub fn new(href: &str, resource: impl Resource + 'static) -> Option<Self> {
        let url = RelativeUrl::parse(href)?;

        Some(Self {
            entries: BTreeSet::from([url]),
            resource: Arc::new(resource),
            closed: CloseFlag::new(),
        })
    }
}

#[async_trait]
impl Container for SingleResourceContainer {
    fn entries(&self) -> &BTreeSet<RelativeUrl> {
        &self.entries
    }

    fn get(&self, href: &str) -> Option<Box<dyn Resource>> {
        if self.closed.is_closed() {
            return None;
        }
        let url = RelativeUrl::parse(href)?;

        self.entries.contains(&url).then(|| {
            Box::new(
                ProxyResource::new(self.resource.clone())
                    .with_href(url.as_str())
                    .forward_close(false),
            ) as Box<dyn Resource>
        })
    }

    async fn close(&self) {
        if self.closed.close() {
            self.resource.close().await;
        }
    }
}
