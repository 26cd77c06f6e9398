use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::reflection::Object;

use super::{Cache, CacheKey};

/// Bounded decorator evicting the least recently used key once `capacity` is exceeded.
#[derive(Debug)]
pub struct LruCache {
    delegate: Box<dyn Cache>,
    capacity: usize,
    // front = least recently used
    order: Mutex<VecDeque<CacheKey>>,
}

impl LruCache {
    #[must_use]
    pub fn new(delegate: Box<dyn Cache>, capacity: usize) -> Self {
        Self {
            delegate,
            capacity: capacity.max(1),
            order: Mutex::new(VecDeque::new()),
        }
    }

    fn touch(&self, key: &CacheKey) -> Option<CacheKey> {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
        order.push_back(key.clone());
        if order.len() > self.capacity {
            order.pop_front()
        } else {
            None
        }
    }
}

impl Cache for LruCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: Vec<Object>) {
        let evicted = self.touch(&key);
        self.delegate.put(key, value);
        if let Some(eldest) = evicted {
            self.delegate.remove(&eldest);
        }
    }

    fn get(&self, key: &CacheKey) -> Option<Vec<Object>> {
        let value = self.delegate.get(key)?;
        self.touch(key);
        Some(value)
    }

    fn remove(&self, key: &CacheKey) -> Option<Vec<Object>> {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|k| k != key);
        self.delegate.remove(key)
    }

    fn clear(&self) {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PerpetualCache;
    use crate::types::RowValues;

    fn key(n: i64) -> CacheKey {
        let mut k = CacheKey::new();
        k.update(n);
        k
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = LruCache::new(Box::new(PerpetualCache::new("lru")), 2);
        cache.put(key(1), vec![Object::Value(RowValues::Int(1))]);
        cache.put(key(2), vec![]);
        assert!(cache.get(&key(1)).is_some());
        cache.put(key(3), vec![]);
        assert!(cache.get(&key(2)).is_none());
        assert!(cache.get(&key(1)).is_some());
        assert_eq!(cache.size(), 2);
    }
}
