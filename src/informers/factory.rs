//! Process-wide registry of shared informers.
//!
//! The factory guarantees at most one informer (hence one network watch)
//! per resource type, regardless of how many callers request it, and
//! coordinates start/sync-wait/shutdown across all of them. It replaces
//! any notion of global singletons: consumers share a factory instance
//! by reference.

use super::config;
use super::ome::OmeGroup;
use super::shared_informer::SharedInformer;
use crate::error::{Error, Result};
use kube::Client;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// Type-erased view of an informer, enough for the factory to launch it
/// and poll its sync state.
trait RunnableInformer: Send + Sync {
    fn has_synced(&self) -> bool;
    fn spawn(self: Arc<Self>, tracker: &TaskTracker, cancel: CancellationToken);
}

impl<K> RunnableInformer for SharedInformer<K>
where
    K: kube::Resource + Clone + Send + Sync + 'static,
{
    fn has_synced(&self) -> bool {
        SharedInformer::has_synced(self)
    }

    fn spawn(self: Arc<Self>, tracker: &TaskTracker, cancel: CancellationToken) {
        tracker.spawn(async move {
            if let Err(err) = self.run(cancel).await {
                error!(error = %err, "informer task exited with error");
            }
        });
    }
}

struct InformerEntry {
    // Arc<SharedInformer<K>> behind both facades; `any` recovers the
    // concrete type for callers, `runner` drives the lifecycle.
    any: Arc<dyn Any + Send + Sync>,
    runner: Arc<dyn RunnableInformer>,
    started: bool,
}

struct FactoryState {
    informers: HashMap<TypeId, InformerEntry>,
    shutting_down: bool,
}

pub struct SharedInformerFactory {
    client: Client,
    namespace: Option<String>,
    default_resync: Duration,
    state: Mutex<FactoryState>,
    tracker: TaskTracker,
}

impl SharedInformerFactory {
    /// Factory watching all namespaces with the default resync period
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_options(
            client,
            Duration::from_secs(config::DEFAULT_RESYNC_SECONDS),
            None,
        )
    }

    #[must_use]
    pub fn with_options(
        client: Client,
        default_resync: Duration,
        namespace: Option<String>,
    ) -> Self {
        Self {
            client,
            namespace,
            default_resync,
            state: Mutex::new(FactoryState {
                informers: HashMap::new(),
                shutting_down: false,
            }),
            tracker: TaskTracker::new(),
        }
    }

    /// Namespace all informers from this factory are restricted to
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Entry point to the OME API group accessors
    #[must_use]
    pub fn ome(&self) -> OmeGroup<'_> {
        OmeGroup::new(self)
    }

    /// Return the singleton informer for `K`, constructing it on first
    /// request via `new_fn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] after `shutdown`, or any error
    /// from `new_fn` itself.
    pub fn informer_for<K, F>(&self, new_fn: F) -> Result<Arc<SharedInformer<K>>>
    where
        K: kube::Resource + Clone + Send + Sync + 'static,
        F: FnOnce(Client, Duration) -> Result<SharedInformer<K>>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.shutting_down {
            return Err(Error::ShuttingDown);
        }

        let type_id = TypeId::of::<K>();
        if let Some(entry) = state.informers.get(&type_id) {
            if let Ok(existing) = Arc::downcast::<SharedInformer<K>>(Arc::clone(&entry.any)) {
                return Ok(existing);
            }
        }

        let informer = Arc::new(new_fn(self.client.clone(), self.default_resync)?);
        state.informers.insert(
            type_id,
            InformerEntry {
                any: Arc::clone(&informer) as Arc<dyn Any + Send + Sync>,
                runner: Arc::clone(&informer) as Arc<dyn RunnableInformer>,
                started: false,
            },
        );
        Ok(informer)
    }

    /// Launch every registered-but-not-yet-started informer on its own
    /// task, all bound to `cancel`. Idempotent per informer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] after `shutdown`.
    pub fn start(&self, cancel: &CancellationToken) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.shutting_down {
            return Err(Error::ShuttingDown);
        }

        for entry in state.informers.values_mut() {
            if !entry.started {
                Arc::clone(&entry.runner).spawn(&self.tracker, cancel.clone());
                entry.started = true;
            }
        }
        Ok(())
    }

    /// Block until every started informer has synced or `cancel` fires.
    /// A `false` in the result means the wait was cancelled before that
    /// informer's first successful list.
    pub async fn wait_for_cache_sync(
        &self,
        cancel: &CancellationToken,
    ) -> HashMap<TypeId, bool> {
        let started: Vec<(TypeId, Arc<dyn RunnableInformer>)> = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state
                .informers
                .iter()
                .filter(|(_, entry)| entry.started)
                .map(|(type_id, entry)| (*type_id, Arc::clone(&entry.runner)))
                .collect()
        };

        let mut result = HashMap::with_capacity(started.len());
        for (type_id, runner) in started {
            let mut synced = runner.has_synced();
            while !synced && !cancel.is_cancelled() {
                sleep(Duration::from_millis(config::SYNC_POLL_INTERVAL_MILLIS)).await;
                synced = runner.has_synced();
            }
            result.insert(type_id, synced);
        }
        result
    }

    /// Close the factory to new informers and block until every started
    /// informer task has observed the cancel signal and exited. The cancel
    /// signal itself is the caller's: cancel first, then shut down.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.shutting_down = true;
        }
        self.tracker.close();
        self.tracker.wait().await;
        info!("informer factory shut down");
    }
}
