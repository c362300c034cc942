// Key-Value Store Port (Interface)
// Durable JSON values by string key

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value (None if the key was never written)
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Write a value, replacing any previous one
    ///
    /// # Errors
    /// - AppError::Storage if the write failed (e.g. quota exceeded)
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// HashMap-backed store. Can be switched to reject writes.
    #[derive(Default)]
    pub struct InMemoryStore {
        values: Mutex<HashMap<String, serde_json::Value>>,
        fail_writes: AtomicBool,
        write_count: AtomicUsize,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn write_count(&self) -> usize {
            self.write_count.load(Ordering::SeqCst)
        }

        pub fn snapshot(&self, key: &str) -> Option<serde_json::Value> {
            self.values.lock().unwrap().get(key).cloned()
        }

        pub fn insert(&self, key: &str, value: serde_json::Value) {
            self.values.lock().unwrap().insert(key.to_string(), value);
        }
    }

    #[async_trait]
    impl KeyValueStore for InMemoryStore {
        async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Storage("quota exceeded".to_string()));
            }
            self.write_count.fetch_add(1, Ordering::SeqCst);
            self.values.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
    }
}
