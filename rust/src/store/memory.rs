use std::collections::HashMap;

use super::{Edit, PrefValue, PreferenceStore, StoreError};

/// Process-local preferences. Nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    entries: HashMap<String, PrefValue>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<PrefValue>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn commit(&mut self, edits: Vec<Edit>) -> Result<(), StoreError> {
        for edit in edits {
            match edit {
                Edit::Put(key, value) => {
                    self.entries.insert(key, value);
                }
                Edit::Remove(key) => {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}
