//! Shared informer: the list-then-watch reconciliation loop.
//!
//! One informer owns one [`Store`] for one resource type. `run` alternates
//! between a full list (establishing a consistent baseline) and an
//! incremental watch, fanning every observed change out to the registered
//! event handlers. Any watch failure falls back to a full re-list rather
//! than resuming from the last resource version; that discards some
//! efficiency after transient disconnects but can never miss events.

use super::config;
use super::lister_watcher::{Filters, ListerWatcher};
use super::lister::Lister;
use super::store::{object_key, IndexFunc, Store};
use crate::error::{Error, Result};
use kube::api::WatchEvent;
use kube::ResourceExt;
use futures::StreamExt;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives notifications for events that happen to a resource.
///
/// Callbacks run synchronously on the informer's reconciliation task, in
/// stream order. A slow handler stalls its own informer's freshness but
/// never another informer's. A panicking handler is caught and logged;
/// the remaining handlers still receive the event.
pub trait ResourceEventHandler<K>: Send + Sync {
    fn on_add(&self, obj: &K);
    fn on_update(&self, old: &K, new: &K);
    fn on_delete(&self, obj: &K);
}

/// Applied to every object before storage, on both list and watch paths
pub type TransformFn<K> = Arc<dyn Fn(K) -> K + Send + Sync>;

struct HandlerEntry<K> {
    handler: Arc<dyn ResourceEventHandler<K>>,
    // Recorded at registration; periodic re-delivery is not scheduled.
    #[allow(dead_code)]
    resync_period: Duration,
}

pub struct SharedInformer<K> {
    lister_watcher: Arc<dyn ListerWatcher<K>>,
    filters: Filters,
    store: Arc<Store<K>>,
    handlers: RwLock<Vec<HandlerEntry<K>>>,
    transform: RwLock<Option<TransformFn<K>>>,
    default_resync: Duration,
    started: AtomicBool,
    stopped: AtomicBool,
    synced: AtomicBool,
    last_sync_resource_version: RwLock<String>,
}

impl<K> SharedInformer<K>
where
    K: kube::Resource + Clone + Send + Sync,
{
    #[must_use]
    pub fn new(
        lister_watcher: Arc<dyn ListerWatcher<K>>,
        filters: Filters,
        default_resync: Duration,
    ) -> Self {
        Self {
            lister_watcher,
            filters,
            store: Arc::new(Store::new()),
            handlers: RwLock::new(Vec::new()),
            transform: RwLock::new(None),
            default_resync,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            last_sync_resource_version: RwLock::new(String::new()),
        }
    }

    /// The store this informer keeps fresh. Objects obtained from it are
    /// immutable snapshots.
    #[must_use]
    pub fn store(&self) -> Arc<Store<K>> {
        Arc::clone(&self.store)
    }

    /// Read-only query facade over this informer's store
    #[must_use]
    pub fn lister(&self) -> Lister<K> {
        Lister::new(self.store())
    }

    #[must_use]
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// True once the first full list has completed and its results are
    /// installed. Never reverts to false on later watch failures.
    #[must_use]
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    /// Watermark recorded from the last successful list or observed event
    #[must_use]
    pub fn last_sync_resource_version(&self) -> String {
        self.last_sync_resource_version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register secondary indices on the backing store.
    ///
    /// # Errors
    ///
    /// Returns an error if an index name is already registered.
    pub fn add_indexers(&self, indexers: HashMap<String, IndexFunc<K>>) -> Result<()> {
        self.store.add_indexers(indexers)
    }

    /// Set the per-informer transform. Must be called before `run`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] once the informer is running,
    /// since objects stored earlier would not have been transformed.
    pub fn set_transform(&self, transform: TransformFn<K>) -> Result<()> {
        if self.started.load(Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }
        *self
            .transform
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(transform);
        Ok(())
    }

    /// Register an event handler with the default resync period.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] if the informer has stopped.
    pub fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<K>>) -> Result<()> {
        self.add_event_handler_with_resync_period(handler, self.default_resync)
    }

    /// Register an event handler with a custom resync period.
    ///
    /// If the informer has already synced, the handler receives a
    /// synthetic add for every object currently in the store before any
    /// subsequently streamed event, so every handler eventually observes
    /// every live object at least once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] if the informer has stopped.
    pub fn add_event_handler_with_resync_period(
        &self,
        handler: Arc<dyn ResourceEventHandler<K>>,
        resync_period: Duration,
    ) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        // Holding the handlers lock here excludes the dispatch path, so no
        // live event can reach the new handler before its synthetic adds.
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if self.synced.load(Ordering::SeqCst) {
            for obj in self.store.list() {
                guarded_dispatch(|| handler.on_add(&obj));
            }
        }
        handlers.push(HandlerEntry {
            handler,
            resync_period,
        });
        Ok(())
    }

    /// Run the reconciliation loop until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if called a second time.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("informer already started, rejecting second run");
            return Err(Error::AlreadyStarted);
        }

        info!("🔍 informer reconciliation loop started");

        loop {
            let listed = tokio::select! {
                () = cancel.cancelled() => break,
                listed = self.list_and_sync() => listed,
            };

            match listed {
                Ok(resource_version) => {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = self.watch_events(&resource_version) => {}
                    }
                    // The watch ended or failed; pause briefly, then
                    // re-establish the baseline with a full list.
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = sleep(Duration::from_secs(config::RELIST_DELAY_SECONDS)) => {}
                    }
                }
                Err(err) => {
                    warn!(error = %err, "full list failed, retrying");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = sleep(Duration::from_secs(config::LIST_RETRY_DELAY_SECONDS)) => {}
                    }
                }
            }
        }

        self.stopped.store(true, Ordering::SeqCst);
        info!("informer reconciliation loop stopped");
        Ok(())
    }

    /// Full list: install the baseline, record the watermark, mark synced,
    /// and dispatch a synthetic add per installed object to every handler.
    async fn list_and_sync(&self) -> Result<String> {
        let (items, resource_version) = self.lister_watcher.list(&self.filters).await?;

        let transform = self
            .transform
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut baseline = HashMap::with_capacity(items.len());
        for item in items {
            let item = match &transform {
                Some(transform) => transform(item),
                None => item,
            };
            baseline.insert(object_key(&item), item);
        }
        let installed: Vec<K> = baseline.values().cloned().collect();

        self.store.replace(baseline, &resource_version);
        *self
            .last_sync_resource_version
            .write()
            .unwrap_or_else(PoisonError::into_inner) = resource_version.clone();
        self.synced.store(true, Ordering::SeqCst);
        debug!(
            count = installed.len(),
            resource_version = %resource_version,
            "full list installed"
        );

        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for entry in handlers.iter() {
            for obj in &installed {
                guarded_dispatch(|| entry.handler.on_add(obj));
            }
        }

        Ok(resource_version)
    }

    /// Consume the watch stream until it ends or yields a stream error.
    /// Either outcome sends the caller back to a full re-list.
    async fn watch_events(&self, resource_version: &str) {
        let mut stream = match self
            .lister_watcher
            .watch(resource_version, &self.filters)
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "failed to open watch stream");
                return;
            }
        };

        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => self.process_event(event),
                Err(err) => {
                    warn!(error = %err, "watch stream error, falling back to full re-list");
                    return;
                }
            }
        }

        debug!("watch stream ended, re-listing");
    }

    fn process_event(&self, event: WatchEvent<K>) {
        match event {
            WatchEvent::Added(obj) => {
                let obj = self.apply_transform(obj);
                self.record_resource_version(&obj);
                let key = object_key(&obj);
                let old = self.store.get(&key);
                self.store.add(&key, obj.clone());
                match old {
                    // A duplicate ADDED for a key we already hold is
                    // dispatched as an update so handlers see the change.
                    Some(old) => self.dispatch(|h| h.on_update(&old, &obj)),
                    None => self.dispatch(|h| h.on_add(&obj)),
                }
            }
            WatchEvent::Modified(obj) => {
                let obj = self.apply_transform(obj);
                self.record_resource_version(&obj);
                let key = object_key(&obj);
                let old = self.store.get(&key);
                self.store.update(&key, obj.clone());
                match old {
                    Some(old) => self.dispatch(|h| h.on_update(&old, &obj)),
                    // Self-healing against a missed add.
                    None => self.dispatch(|h| h.on_add(&obj)),
                }
            }
            WatchEvent::Deleted(obj) => {
                let obj = self.apply_transform(obj);
                self.record_resource_version(&obj);
                let key = object_key(&obj);
                if let Some(old) = self.store.delete(&key) {
                    self.dispatch(|h| h.on_delete(&old));
                }
            }
            WatchEvent::Bookmark(bookmark) => {
                *self
                    .last_sync_resource_version
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) =
                    bookmark.metadata.resource_version;
            }
            WatchEvent::Error(err) => {
                error!(
                    code = err.code,
                    reason = %err.reason,
                    "error event on watch stream: {}",
                    err.message
                );
            }
        }
    }

    fn apply_transform(&self, obj: K) -> K {
        let transform = self
            .transform
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match transform {
            Some(transform) => transform(obj),
            None => obj,
        }
    }

    fn record_resource_version(&self, obj: &K) {
        if let Some(resource_version) = obj.resource_version() {
            if !resource_version.is_empty() {
                *self
                    .last_sync_resource_version
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = resource_version;
            }
        }
    }

    fn dispatch(&self, notify: impl Fn(&dyn ResourceEventHandler<K>)) {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for entry in handlers.iter() {
            guarded_dispatch(|| notify(entry.handler.as_ref()));
        }
    }
}

// One handler's panic must not starve the others or stop the loop.
fn guarded_dispatch(notify: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(notify)).is_err() {
        error!("event handler panicked, continuing with remaining handlers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1beta1::{BaseModel, BaseModelSpec};
    use crate::error::Error;
    use crate::informers::lister_watcher::EventStream;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct NeverListerWatcher;

    #[async_trait]
    impl ListerWatcher<BaseModel> for NeverListerWatcher {
        async fn list(&self, _filters: &Filters) -> Result<(Vec<BaseModel>, String)> {
            Err(Error::custom("unreachable in these tests"))
        }

        async fn watch(
            &self,
            _resource_version: &str,
            _filters: &Filters,
        ) -> Result<EventStream<BaseModel>> {
            Ok(futures::stream::pending().boxed())
        }
    }

    fn informer() -> SharedInformer<BaseModel> {
        SharedInformer::new(
            Arc::new(NeverListerWatcher),
            Filters::default(),
            Duration::from_secs(config::DEFAULT_RESYNC_SECONDS),
        )
    }

    #[derive(Default)]
    struct Recorder {
        adds: Mutex<Vec<String>>,
    }

    impl ResourceEventHandler<BaseModel> for Recorder {
        fn on_add(&self, obj: &BaseModel) {
            self.adds.lock().unwrap().push(object_key(obj));
        }
        fn on_update(&self, _old: &BaseModel, _new: &BaseModel) {}
        fn on_delete(&self, _obj: &BaseModel) {}
    }

    struct Panicker;

    impl ResourceEventHandler<BaseModel> for Panicker {
        fn on_add(&self, _obj: &BaseModel) {
            panic!("handler bug");
        }
        fn on_update(&self, _old: &BaseModel, _new: &BaseModel) {}
        fn on_delete(&self, _obj: &BaseModel) {}
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let informer = informer();
        let recorder = Arc::new(Recorder::default());
        informer.add_event_handler(Arc::new(Panicker)).unwrap();
        informer.add_event_handler(recorder.clone()).unwrap();

        let obj = BaseModel::new("llama", BaseModelSpec::default());
        informer.dispatch(|h| h.on_add(&obj));

        assert_eq!(*recorder.adds.lock().unwrap(), vec!["llama"]);
    }

    #[test]
    fn test_modified_without_prior_value_dispatches_add() {
        let informer = informer();
        let recorder = Arc::new(Recorder::default());
        informer.add_event_handler(recorder.clone()).unwrap();

        let mut obj = BaseModel::new("llama", BaseModelSpec::default());
        obj.metadata.namespace = Some("default".to_string());
        obj.metadata.resource_version = Some("7".to_string());
        informer.process_event(WatchEvent::Modified(obj));

        assert_eq!(*recorder.adds.lock().unwrap(), vec!["default/llama"]);
        assert!(informer.store().get("default/llama").is_some());
        assert_eq!(informer.last_sync_resource_version(), "7");
    }

    #[test]
    fn test_deleted_absent_key_is_noop() {
        let informer = informer();
        let mut obj = BaseModel::new("gone", BaseModelSpec::default());
        obj.metadata.namespace = Some("default".to_string());
        informer.process_event(WatchEvent::Deleted(obj));
        assert!(informer.store().is_empty());
    }

    #[test]
    fn test_error_event_does_not_mutate_store() {
        let informer = informer();
        informer.process_event(WatchEvent::Error(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "too old".to_string(),
            reason: "Expired".to_string(),
            code: 410,
        }));
        assert!(informer.store().is_empty());
        assert!(!informer.has_synced());
    }
}
