pub mod config;
pub mod factory;
pub mod lister;
pub mod lister_watcher;
pub mod ome;
pub mod shared_informer;
pub mod store;

pub use factory::SharedInformerFactory;
pub use lister::{Lister, NamespacedLister};
pub use lister_watcher::{ApiListerWatcher, EventStream, Filters, ListerWatcher};
pub use shared_informer::{ResourceEventHandler, SharedInformer, TransformFn};
pub use store::{namespace_index_func, object_key, IndexFunc, Store, NAMESPACE_INDEX};
