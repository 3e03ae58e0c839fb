//! Thread-safe indexed store backing a shared informer.
//!
//! One informer owns one store and is its only mutator; listers and event
//! handlers read copies. All mutating operations and `list`/`replace` go
//! through the same lock, so readers never observe a store mid-mutation.

use crate::error::{Error, Result};
use kube::ResourceExt;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Name of the namespace index registered for namespaced resources
pub const NAMESPACE_INDEX: &str = "namespace";

/// Computes the index values of an object under one named index
pub type IndexFunc<K> = Arc<dyn Fn(&K) -> Vec<String> + Send + Sync>;

/// Derive the store key for an object: `"{namespace}/{name}"` for
/// namespaced objects, bare `"{name}"` for cluster-scoped ones.
#[must_use]
pub fn object_key<K: ResourceExt>(obj: &K) -> String {
    let name = obj.name_any();
    match obj.namespace() {
        Some(namespace) if !namespace.is_empty() => format!("{namespace}/{name}"),
        _ => name,
    }
}

/// Index function grouping objects by their namespace
#[must_use]
pub fn namespace_index_func<K: ResourceExt>() -> IndexFunc<K> {
    Arc::new(|obj: &K| obj.namespace().into_iter().collect())
}

struct StoreInner<K> {
    items: HashMap<String, K>,
    indexers: HashMap<String, IndexFunc<K>>,
    // index name -> index value -> keys of matching objects
    indices: HashMap<String, HashMap<String, BTreeSet<String>>>,
    resource_version: String,
}

/// Mutation-safe mapping from object key to the latest known object,
/// with optional secondary indices.
pub struct Store<K> {
    inner: RwLock<StoreInner<K>>,
}

impl<K> Default for Store<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Store<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                items: HashMap::new(),
                indexers: HashMap::new(),
                indices: HashMap::new(),
                resource_version: String::new(),
            }),
        }
    }
}

impl<K: Clone> Store<K> {
    /// Register additional indexers, backfilling them from current contents.
    ///
    /// # Errors
    ///
    /// Returns an error if an index with the same name is already registered.
    pub fn add_indexers(&self, indexers: HashMap<String, IndexFunc<K>>) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for name in indexers.keys() {
            if inner.indexers.contains_key(name) {
                return Err(Error::custom(format!("indexer {name} already registered")));
            }
        }
        for (name, func) in indexers {
            let mut index: HashMap<String, BTreeSet<String>> = HashMap::new();
            for (key, obj) in &inner.items {
                for value in func(obj) {
                    index.entry(value).or_default().insert(key.clone());
                }
            }
            inner.indices.insert(name.clone(), index);
            inner.indexers.insert(name, func);
        }
        Ok(())
    }

    #[must_use]
    pub fn has_indexer(&self, name: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .indexers
            .contains_key(name)
    }

    pub fn add(&self, key: &str, obj: K) {
        self.put(key, obj);
    }

    /// Same write path as `add`; kept separate so callers state intent
    pub fn update(&self, key: &str, obj: K) {
        self.put(key, obj);
    }

    fn put(&self, key: &str, obj: K) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let old = inner.items.insert(key.to_string(), obj);
        let new = inner.items.get(key).cloned();
        update_indices(&mut inner, key, old.as_ref(), new.as_ref());
    }

    /// Remove the object under `key`, returning the evicted value.
    /// Deleting an absent key is a no-op.
    pub fn delete(&self, key: &str) -> Option<K> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let old = inner.items.remove(key)?;
        update_indices(&mut inner, key, Some(&old), None);
        Some(old)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<K> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .get(key)
            .cloned()
    }

    /// Snapshot of all stored objects
    #[must_use]
    pub fn list(&self) -> Vec<K> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of all stored keys
    #[must_use]
    pub fn list_keys(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .keys()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically swap the entire contents for a freshly listed baseline.
    /// All indices are rebuilt from the new items.
    pub fn replace(&self, items: HashMap<String, K>, resource_version: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.items = items;
        inner.resource_version = resource_version.to_string();
        let names: Vec<String> = inner.indexers.keys().cloned().collect();
        for name in names {
            let func = Arc::clone(&inner.indexers[&name]);
            let mut index: HashMap<String, BTreeSet<String>> = HashMap::new();
            for (key, obj) in &inner.items {
                for value in func(obj) {
                    index.entry(value).or_default().insert(key.clone());
                }
            }
            inner.indices.insert(name, index);
        }
    }

    /// Resource version recorded by the last `replace`
    #[must_use]
    pub fn resource_version(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resource_version
            .clone()
    }

    /// Keys of stored objects whose `index_name` value equals `value`,
    /// in sorted order. Unknown indices and unindexed values yield an
    /// empty set.
    #[must_use]
    pub fn index_keys(&self, index_name: &str, value: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .indices
            .get(index_name)
            .and_then(|index| index.get(value))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All values present in the named index, in arbitrary order
    #[must_use]
    pub fn index_values(&self, index_name: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .indices
            .get(index_name)
            .map(|index| index.keys().cloned().collect())
            .unwrap_or_default()
    }
}

// Stale entries for `old` are removed before entries for `new` are added,
// so an index never points at a key whose stored object no longer matches.
fn update_indices<K: Clone>(
    inner: &mut StoreInner<K>,
    key: &str,
    old: Option<&K>,
    new: Option<&K>,
) {
    let names: Vec<String> = inner.indexers.keys().cloned().collect();
    for name in names {
        let func = Arc::clone(&inner.indexers[&name]);
        let index = inner.indices.entry(name).or_default();
        if let Some(old) = old {
            for value in func(old) {
                if let Some(keys) = index.get_mut(&value) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(&value);
                    }
                }
            }
        }
        if let Some(new) = new {
            for value in func(new) {
                index.entry(value).or_default().insert(key.to_string());
            }
        }
    }
}
