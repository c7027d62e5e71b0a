use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::Medium;
use crate::error::{LaddrrError, Result};

/// Process-local medium. Collections live as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>>> {
        self.collections
            .lock()
            .map_err(|_| LaddrrError::Store("memory medium lock poisoned".into()))
    }
}

impl Medium for MemoryMedium {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self, key: &str) -> Result<Vec<Value>> {
        Ok(self.guard()?.get(key).cloned().unwrap_or_default())
    }

    fn save(&self, key: &str, records: &[Value]) -> Result<()> {
        self.guard()?.insert(key.to_string(), records.to_vec());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.guard()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
