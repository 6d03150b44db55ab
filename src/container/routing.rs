use crate::container::Container;
use crate::resource::Resource;
use crate::util::uri::RelativeUrl;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

type Predicate = dyn Fn(&RelativeUrl) -> bool + Send + Sync;

/// A route of a [`RoutingContainer`], pairing a predicate with a child container.
pub struct Route {
    accepts: Box<Predicate>,
    container: Arc<dyn Container>,
}

impl Route {
    /// Creates a route dispatching hrefs accepted by `predicate` to `container`.
    pub fn new(
        container: Arc<dyn Container>,
        predicate: impl Fn(&RelativeUrl) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            accepts: Box::new(predicate),
            container,
        }
    }

    /// Creates a route accepting every href.
    pub fn fallback(container: Arc<dyn Container>) -> Self {
        Self::new(container, |_| true)
    }

    /// Creates a route accepting the entries of `container`.
    pub fn entries_of(container: Arc<dyn Container>) -> Self {
        let child = container.clone();
        Self::new(container, move |url| child.entries().contains(url))
    }
}

/// A [`Container`] dispatching each lookup to the first [`Route`] accepting the href.
///
/// Routes are tried in order.
/// The chosen child's answer is final, even if the href is absent from it.
/// [`entries`](Container::entries) is the union of every child's entries.
///
/// # Examples
/// ```
/// # use rbook_fetch::container::{Container, Route, RoutingContainer, SingleResourceContainer};
/// # use rbook_fetch::resource::BufferResource;
/// # use std::sync::Arc;
/// let single = |href| SingleResourceContainer::new(href, BufferResource::new("")).unwrap();
/// let overrides = Arc::new(single("style.css"));
/// let base = Arc::new(single("c1.xhtml"));
///
/// let container = RoutingContainer::new([Route::entries_of(overrides), Route::fallback(base)]);
///
/// assert_eq!(2, container.entries().len());
/// assert!(container.get("style.css").is_some());
/// assert!(container.get("c1.xhtml").is_some());
/// ```
pub struct RoutingContainer {
    routes: Vec<Route>,
    entries: BTreeSet<RelativeUrl>,
}

impl RoutingContainer {
    /// Creates a container from ordered `routes`.
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Self {
        let routes = routes.into_iter().collect::<Vec<_>>();
        let entries = routes
            .iter()
            .flat_map(|route| route.container.entries().iter().cloned())
            .collect();

        Self { routes, entries }
    }
}

#[async_trait]
impl Container for RoutingContainer {
    fn entries(&self) -> &BTreeSet<RelativeUrl> {
        &self.entries
    }

    fn get(&self, href: &str) -> Option<Box<dyn Resource>> {
        let url = RelativeUrl::parse(href)?;

        self.routes
            .iter()
            .find(|route| (route.accepts)(&url))
            .and_then(|route| route.container.get(href))
    }

    async fn close(&self) {
        for route in &self.routes {
            route.container.close().await;
        }
    }
}
