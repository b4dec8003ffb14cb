//! In-memory slots for tests

use super::{KvStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryKvStore {
    slots: Mutex<HashMap<String, String>>,
}

#[allow(dead_code)] // Used in tests
impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot, as if written by an earlier run
    pub fn with_slot(self, key: &str, value: &str) -> Self {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        slots.remove(key);
        Ok(())
    }
}
