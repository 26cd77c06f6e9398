use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::reflection::Object;

use super::{Cache, CacheKey};

/// Session-side staging area in front of a shared cache.
///
/// Puts are buffered until [`commit`](Self::commit); a [`clear`](Self::clear) hides the
/// shared entries from this session at once and empties the shared cache on commit.
#[derive(Debug)]
pub struct TransactionalCache {
    delegate: Arc<dyn Cache>,
    clear_on_commit: bool,
    entries_to_add_on_commit: HashMap<CacheKey, Vec<Object>>,
}

impl TransactionalCache {
    #[must_use]
    pub fn new(delegate: Arc<dyn Cache>) -> Self {
        Self {
            delegate,
            clear_on_commit: false,
            entries_to_add_on_commit: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Vec<Object>> {
        if self.clear_on_commit {
            return None;
        }
        self.delegate.get(key)
    }

    pub fn put(&mut self, key: CacheKey, value: Vec<Object>) {
        self.entries_to_add_on_commit.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.clear_on_commit = true;
        self.entries_to_add_on_commit.clear();
    }

    pub fn commit(&mut self) {
        if self.clear_on_commit {
            self.delegate.clear();
        }
        let staged = self.entries_to_add_on_commit.len();
        for (key, value) in self.entries_to_add_on_commit.drain() {
            self.delegate.put(key, value);
        }
        if staged > 0 {
            debug!(cache = self.delegate.id(), staged, "published staged cache entries");
        }
        self.clear_on_commit = false;
    }

    pub fn rollback(&mut self) {
        self.clear_on_commit = false;
        self.entries_to_add_on_commit.clear();
    }
}

/// One [`TransactionalCache`] per shared cache touched by a session.
#[derive(Debug, Default)]
pub struct TransactionalCacheManager {
    caches: HashMap<String, TransactionalCache>,
}

impl TransactionalCacheManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn staged(&mut self, cache: &Arc<dyn Cache>) -> &mut TransactionalCache {
        self.caches
            .entry(cache.id().to_string())
            .or_insert_with(|| TransactionalCache::new(Arc::clone(cache)))
    }

    pub fn clear(&mut self, cache: &Arc<dyn Cache>) {
        self.staged(cache).clear();
    }

    pub fn get(&mut self, cache: &Arc<dyn Cache>, key: &CacheKey) -> Option<Vec<Object>> {
        self.staged(cache).get(key)
    }

    pub fn put(&mut self, cache: &Arc<dyn Cache>, key: CacheKey, value: Vec<Object>) {
        self.staged(cache).put(key, value);
    }

    pub fn commit(&mut self) {
        for cache in self.caches.values_mut() {
            cache.commit();
        }
    }

    pub fn rollback(&mut self) {
        for cache in self.caches.values_mut() {
            cache.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PerpetualCache;
    use crate::types::RowValues;

    #[test]
    fn puts_are_published_on_commit_only() {
        let shared: Arc<dyn Cache> = Arc::new(PerpetualCache::new("users"));
        let mut manager = TransactionalCacheManager::new();
        let mut key = CacheKey::new();
        key.update("users.findAll");

        manager.put(&shared, key.clone(), vec![Object::Value(RowValues::Int(1))]);
        assert!(manager.get(&shared, &key).is_none());
        manager.commit();
        assert_eq!(shared.size(), 1);

        manager.clear(&shared);
        assert!(manager.get(&shared, &key).is_none());
        manager.rollback();
        assert!(manager.get(&shared, &key).is_some());

        manager.clear(&shared);
        manager.commit();
        assert_eq!(shared.size(), 0);
    }
}
