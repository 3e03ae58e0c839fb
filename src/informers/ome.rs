//! `factory.ome().v1beta1().<resource>()` accessors.
//!
//! Each resource accessor hands out the factory's singleton informer for
//! its type, wiring an [`ApiListerWatcher`] over the right `kube::Api`
//! scope and pre-registering the namespace index for namespaced kinds.

use super::factory::SharedInformerFactory;
use super::lister::Lister;
use super::lister_watcher::{ApiListerWatcher, Filters};
use super::shared_informer::SharedInformer;
use super::store::{namespace_index_func, NAMESPACE_INDEX};
use crate::api::v1beta1::{BaseModel, ClusterBaseModel, FineTunedWeight, InferenceService};
use crate::error::Result;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::Api;
use kube::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

type InformerCtor<K> = fn(Client, Duration, Option<String>) -> Result<SharedInformer<K>>;

pub struct OmeGroup<'a> {
    factory: &'a SharedInformerFactory,
}

impl<'a> OmeGroup<'a> {
    pub(crate) fn new(factory: &'a SharedInformerFactory) -> Self {
        Self { factory }
    }

    #[must_use]
    pub fn v1beta1(&self) -> V1beta1Group<'a> {
        V1beta1Group {
            factory: self.factory,
        }
    }
}

pub struct V1beta1Group<'a> {
    factory: &'a SharedInformerFactory,
}

impl<'a> V1beta1Group<'a> {
    #[must_use]
    pub fn base_models(&self) -> ResourceInformers<'a, BaseModel> {
        ResourceInformers {
            factory: self.factory,
            ctor: namespaced_informer::<BaseModel>,
        }
    }

    #[must_use]
    pub fn cluster_base_models(&self) -> ResourceInformers<'a, ClusterBaseModel> {
        ResourceInformers {
            factory: self.factory,
            ctor: cluster_informer::<ClusterBaseModel>,
        }
    }

    #[must_use]
    pub fn inference_services(&self) -> ResourceInformers<'a, InferenceService> {
        ResourceInformers {
            factory: self.factory,
            ctor: namespaced_informer::<InferenceService>,
        }
    }

    #[must_use]
    pub fn fine_tuned_weights(&self) -> ResourceInformers<'a, FineTunedWeight> {
        ResourceInformers {
            factory: self.factory,
            ctor: cluster_informer::<FineTunedWeight>,
        }
    }
}

/// Informer and lister accessors for one resource type
pub struct ResourceInformers<'a, K> {
    factory: &'a SharedInformerFactory,
    ctor: InformerCtor<K>,
}

impl<K> ResourceInformers<'_, K>
where
    K: kube::Resource + Clone + Send + Sync + 'static,
{
    /// The factory's singleton shared informer for this resource type.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory is shutting down.
    pub fn informer(&self) -> Result<Arc<SharedInformer<K>>> {
        let namespace = self.factory.namespace().map(ToString::to_string);
        self.factory
            .informer_for(|client, resync| (self.ctor)(client, resync, namespace))
    }

    /// Read-only lister over the informer's store.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory is shutting down.
    pub fn lister(&self) -> Result<Lister<K>> {
        Ok(self.informer()?.lister())
    }
}

fn namespaced_informer<K>(
    client: Client,
    resync: Duration,
    namespace: Option<String>,
) -> Result<SharedInformer<K>>
where
    K: kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    let api: Api<K> = match &namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };
    let filters = Filters {
        namespace,
        ..Filters::default()
    };
    let informer = SharedInformer::new(Arc::new(ApiListerWatcher::new(api)), filters, resync);
    informer.add_indexers(HashMap::from([(
        NAMESPACE_INDEX.to_string(),
        namespace_index_func(),
    )]))?;
    Ok(informer)
}

// Cluster-scoped kinds ignore the factory namespace and carry no
// namespace index.
fn cluster_informer<K>(
    client: Client,
    resync: Duration,
    _namespace: Option<String>,
) -> Result<SharedInformer<K>>
where
    K: kube::Resource<Scope = ClusterResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    let api: Api<K> = Api::all(client);
    Ok(SharedInformer::new(
        Arc::new(ApiListerWatcher::new(api)),
        Filters::default(),
        resync,
    ))
}
