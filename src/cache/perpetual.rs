use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::reflection::Object;

use super::{Cache, CacheKey};

/// Unbounded cache.
#[derive(Debug)]
pub struct PerpetualCache {
    id: String,
    entries: Mutex<HashMap<CacheKey, Vec<Object>>>,
}

impl PerpetualCache {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Vec<Object>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Cache for PerpetualCache {
    fn id(&self) -> &str {
        &self.id
    }

    fn put(&self, key: CacheKey, value: Vec<Object>) {
        self.entries().insert(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<Vec<Object>> {
        self.entries().get(key).cloned()
    }

    fn remove(&self, key: &CacheKey) -> Option<Vec<Object>> {
        self.entries().remove(key)
    }

    fn clear(&self) {
        self.entries().clear();
    }

    fn size(&self) -> usize {
        self.entries().len()
    }
}
