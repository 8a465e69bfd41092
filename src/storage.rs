//! Persistent key-value store boundary
//!
//! The hosting environment owns the actual storage (in the original
//! deployment this is the browser profile's local storage area). The
//! trait carries plain string values; implementations are expected to
//! absorb their own transport failures, since absence of a key already
//! means "use the default".

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Trait for persistent key-value stores
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value, `None` when absent
    async fn get(&self, key: &str) -> Option<String>;

    /// Writes a value
    async fn set(&self, key: &str, value: &str);
}

/// Process-local store, useful for embedding and tests
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }
}
