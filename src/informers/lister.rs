//! Read-only query facade over an informer's store. Never touches the
//! network; staleness is bounded by the informer's watch latency.

use super::store::{Store, NAMESPACE_INDEX};
use kube::ResourceExt;
use std::sync::Arc;

pub struct Lister<K> {
    store: Arc<Store<K>>,
}

impl<K> Clone for Lister<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<K> Lister<K>
where
    K: kube::Resource + Clone,
{
    #[must_use]
    pub fn new(store: Arc<Store<K>>) -> Self {
        Self { store }
    }

    /// All cached objects, optionally restricted to one namespace.
    ///
    /// Uses the namespace index when the store has one registered, which
    /// is O(namespace size); otherwise falls back to a full scan.
    #[must_use]
    pub fn list(&self, namespace: Option<&str>) -> Vec<K> {
        let Some(namespace) = namespace else {
            return self.store.list();
        };

        if self.store.has_indexer(NAMESPACE_INDEX) {
            self.store
                .index_keys(NAMESPACE_INDEX, namespace)
                .iter()
                .filter_map(|key| self.store.get(key))
                .collect()
        } else {
            self.store
                .list()
                .into_iter()
                .filter(|obj| obj.namespace().as_deref() == Some(namespace))
                .collect()
        }
    }

    /// Look up one object by name, and namespace where applicable
    #[must_use]
    pub fn get(&self, name: &str, namespace: Option<&str>) -> Option<K> {
        let key = match namespace {
            Some(namespace) => format!("{namespace}/{name}"),
            None => name.to_string(),
        };
        self.store.get(&key)
    }

    /// A lister bound to one namespace at construction
    #[must_use]
    pub fn namespaced(&self, namespace: impl Into<String>) -> NamespacedLister<K> {
        NamespacedLister {
            lister: self.clone(),
            namespace: namespace.into(),
        }
    }
}

pub struct NamespacedLister<K> {
    lister: Lister<K>,
    namespace: String,
}

impl<K> NamespacedLister<K>
where
    K: kube::Resource + Clone,
{
    #[must_use]
    pub fn list(&self) -> Vec<K> {
        self.lister.list(Some(&self.namespace))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<K> {
        self.lister.get(name, Some(&self.namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1beta1::{BaseModel, BaseModelSpec};
    use crate::informers::store::{namespace_index_func, object_key};
    use std::collections::HashMap;

    fn model(namespace: &str, name: &str) -> BaseModel {
        let mut m = BaseModel::new(name, BaseModelSpec::default());
        m.metadata.namespace = Some(namespace.to_string());
        m
    }

    fn populated_store(indexed: bool) -> Arc<Store<BaseModel>> {
        let store = Arc::new(Store::new());
        if indexed {
            store
                .add_indexers(HashMap::from([(
                    NAMESPACE_INDEX.to_string(),
                    namespace_index_func(),
                )]))
                .unwrap();
        }
        for obj in [model("default", "a"), model("default", "b"), model("prod", "c")] {
            store.add(&object_key(&obj), obj.clone());
        }
        store
    }

    #[test]
    fn test_list_with_namespace_index() {
        let lister = Lister::new(populated_store(true));
        assert_eq!(lister.list(None).len(), 3);
        assert_eq!(lister.list(Some("default")).len(), 2);
        assert_eq!(lister.list(Some("prod")).len(), 1);
        assert!(lister.list(Some("missing")).is_empty());
    }

    #[test]
    fn test_list_falls_back_to_full_scan() {
        let lister = Lister::new(populated_store(false));
        assert_eq!(lister.list(Some("default")).len(), 2);
        assert!(lister.list(Some("missing")).is_empty());
    }

    #[test]
    fn test_get_by_name() {
        let lister = Lister::new(populated_store(true));
        assert!(lister.get("a", Some("default")).is_some());
        assert!(lister.get("a", Some("prod")).is_none());
        assert!(lister.get("a", None).is_none());
    }

    #[test]
    fn test_namespaced_variant() {
        let lister = Lister::new(populated_store(true)).namespaced("prod");
        assert_eq!(lister.list().len(), 1);
        assert!(lister.get("c").is_some());
        assert!(lister.get("a").is_none());
    }
}
