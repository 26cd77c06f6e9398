//! Query result caches.
//!
//! Every executor keeps a session-local [`PerpetualCache`]. Statements bound to a cache
//! namespace additionally share a process-wide cache registered on the configuration, reached
//! through the caching executor and staged per session by a [`TransactionalCacheManager`].

pub mod key;
pub mod lru;
pub mod perpetual;
pub mod transactional;

use std::fmt;

use crate::reflection::Object;

pub use key::CacheKey;
pub use lru::LruCache;
pub use perpetual::PerpetualCache;
pub use transactional::{TransactionalCache, TransactionalCacheManager};

/// Storage for query results keyed by [`CacheKey`].
///
/// Implementations use interior mutability; a cache is shared between sessions behind an
/// `Arc`.
pub trait Cache: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn put(&self, key: CacheKey, value: Vec<Object>);

    fn get(&self, key: &CacheKey) -> Option<Vec<Object>>;

    fn remove(&self, key: &CacheKey) -> Option<Vec<Object>>;

    fn clear(&self);

    fn size(&self) -> usize;
}
