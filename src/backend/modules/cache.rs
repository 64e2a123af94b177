//! Module export cache.
//!
//! Executed modules are cached by normalized id for the lifetime of the
//! loader. Entries are never evicted and never invalidated when the
//! repository chain changes.

use std::collections::HashMap;

use super::path::ModuleId;
use crate::backend::script::Value;

#[derive(Default)]
pub struct ModuleCache {
    entries: HashMap<ModuleId, Value>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ModuleId) -> Option<Value> {
        self.entries.get(id).cloned()
    }

    /// Store `exports` for `id`, replacing any previous entry.
    pub fn put(&mut self, id: ModuleId, exports: Value) {
        self.entries.insert(id, exports);
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached ids in sorted order.
    pub fn ids(&self) -> Vec<&ModuleId> {
        let mut ids: Vec<_> = self.entries.keys().collect();
        ids.sort();
        ids
    }
}
