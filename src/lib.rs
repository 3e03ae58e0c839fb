//! Client-side shared informers for the OME operator's custom resources.
//!
//! An informer keeps a local, eventually-consistent mirror of one remote
//! resource collection fresh through an initial full list followed by a
//! continuous watch, and fans change notifications out to any number of
//! consumers without each of them re-querying the apiserver. The
//! [`informers::SharedInformerFactory`] deduplicates informers per
//! resource type, so a process holds at most one watch per type.
//!
//! ```no_run
//! use ome_client::informers::{ResourceEventHandler, SharedInformerFactory};
//! use ome_client::api::v1beta1::BaseModel;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! struct LogModels;
//!
//! impl ResourceEventHandler<BaseModel> for LogModels {
//!     fn on_add(&self, obj: &BaseModel) {
//!         println!("model added: {:?}", obj.metadata.name);
//!     }
//!     fn on_update(&self, _old: &BaseModel, _new: &BaseModel) {}
//!     fn on_delete(&self, _obj: &BaseModel) {}
//! }
//!
//! # async fn example() -> ome_client::Result<()> {
//! let client = ome_client::client::new(Some(ome_client::client::USER_AGENT)).await?;
//! let factory = SharedInformerFactory::new(client);
//!
//! let models = factory.ome().v1beta1().base_models();
//! models.informer()?.add_event_handler(Arc::new(LogModels))?;
//!
//! let cancel = CancellationToken::new();
//! factory.start(&cancel)?;
//! factory.wait_for_cache_sync(&cancel).await;
//!
//! let lister = models.lister()?;
//! for model in lister.list(Some("default")) {
//!     println!("cached: {:?}", model.metadata.name);
//! }
//!
//! cancel.cancel();
//! factory.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod informers;

pub use error::{Error, Result};
