use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{StateStorage, StorageError};

/// In-memory storage with separate staged and durable maps.
#[derive(Debug, Default)]
pub struct InMemoryStateStorage {
    inner: Mutex<Fields>,
}

#[derive(Debug, Default)]
struct Fields {
    staged: HashMap<String, Value>,
    durable: HashMap<String, Value>,
    saves: usize,
}

impl InMemoryStateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose durable state already holds `name = value`.
    pub fn seeded(name: &str, value: Value) -> Self {
        let storage = Self::new();
        {
            let mut fields = storage.lock();
            fields.staged.insert(name.to_string(), value.clone());
            fields.durable.insert(name.to_string(), value);
        }
        storage
    }

    /// The last flushed value of a field.
    pub fn durable_field(&self, name: &str) -> Option<Value> {
        self.lock().durable.get(name).cloned()
    }

    /// Number of `save_state` calls so far.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> MutexGuard<'_, Fields> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateStorage for InMemoryStateStorage {
    fn get_field(&self, name: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.lock().staged.get(name).cloned())
    }

    fn set_field(&self, name: &str, value: Value) -> Result<(), StorageError> {
        self.lock().staged.insert(name.to_string(), value);
        Ok(())
    }

    fn remove_field(&self, name: &str) -> Result<(), StorageError> {
        self.lock().staged.remove(name);
        Ok(())
    }

    fn save_state(&self) -> Result<(), StorageError> {
        let mut fields = self.lock();
        fields.durable = fields.staged.clone();
        fields.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn staged_fields_are_not_durable_until_saved() {
        let storage = InMemoryStateStorage::new();
        storage.set_field("customer", json!({ "a": 1 })).unwrap();
        assert_eq!(storage.get_field("customer").unwrap(), Some(json!({ "a": 1 })));
        assert!(storage.durable_field("customer").is_none());

        storage.save_state().unwrap();
        assert_eq!(storage.durable_field("customer"), Some(json!({ "a": 1 })));
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn seeded_storage_is_durable() {
        let storage = InMemoryStateStorage::seeded("customer", json!(1));
        assert_eq!(storage.durable_field("customer"), Some(json!(1)));
        assert_eq!(storage.save_count(), 0);
    }
}
