//! Seam between the informer core and the remote API.
//!
//! The reconciliation loop only ever talks to a [`ListerWatcher`], so tests
//! can drive it with scripted data and production code wires in
//! [`ApiListerWatcher`] over a `kube::Api`.

use super::config;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{Api, ListParams, WatchEvent, WatchParams};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Filters forwarded unchanged to the remote list/watch calls
#[derive(Debug, Clone, Default)]
pub struct Filters {
    /// Namespace the informer is scoped to, `None` for all namespaces
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

/// Long-lived change-event stream; may terminate spontaneously at any
/// time, which callers must treat as retryable, not fatal
pub type EventStream<K> = BoxStream<'static, kube::Result<WatchEvent<K>>>;

/// The two remote operations an informer depends on
#[async_trait]
pub trait ListerWatcher<K>: Send + Sync {
    /// Full read of the collection, returning the items and the collection
    /// resource version usable as a watch resume token.
    async fn list(&self, filters: &Filters) -> Result<(Vec<K>, String)>;

    /// Open a change-event stream starting at `resource_version`.
    async fn watch(&self, resource_version: &str, filters: &Filters) -> Result<EventStream<K>>;
}

/// Production [`ListerWatcher`] backed by a `kube::Api`. Namespace scoping
/// is fixed at `Api` construction; selectors pass through per call.
pub struct ApiListerWatcher<K> {
    api: Api<K>,
}

impl<K> ApiListerWatcher<K> {
    #[must_use]
    pub fn new(api: Api<K>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<K> ListerWatcher<K> for ApiListerWatcher<K>
where
    K: kube::Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    async fn list(&self, filters: &Filters) -> Result<(Vec<K>, String)> {
        let mut lp = ListParams::default();
        if let Some(labels) = &filters.label_selector {
            lp = lp.labels(labels);
        }
        if let Some(fields) = &filters.field_selector {
            lp = lp.fields(fields);
        }

        let list = self.api.list(&lp).await?;
        let resource_version = list.metadata.resource_version.clone().unwrap_or_default();
        Ok((list.items, resource_version))
    }

    async fn watch(&self, resource_version: &str, filters: &Filters) -> Result<EventStream<K>> {
        let mut wp = WatchParams::default().timeout(config::WATCH_TIMEOUT_SECONDS);
        if let Some(labels) = &filters.label_selector {
            wp = wp.labels(labels);
        }
        if let Some(fields) = &filters.field_selector {
            wp = wp.fields(fields);
        }

        let stream = self.api.watch(&wp, resource_version).await?;
        Ok(stream.boxed())
    }
}
