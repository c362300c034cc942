// Buffer persistence through the key-value store
use crate::application::constants::{BUFFER_STORAGE_KEY, IN_FLIGHT_STORAGE_KEY};
use crate::domain::QueueItem;
use crate::error::Result;
use crate::port::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Saves and restores the queue buffer snapshot
pub struct BufferPersistence {
    store: Arc<dyn KeyValueStore>,
}

impl BufferPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist the full buffer and the in-flight counter
    pub async fn save(&self, items: &[QueueItem], in_flight: usize) -> Result<()> {
        self.store
            .set(BUFFER_STORAGE_KEY, serde_json::to_value(items)?)
            .await?;
        self.store
            .set(IN_FLIGHT_STORAGE_KEY, serde_json::Value::from(in_flight))
            .await?;

        debug!(items = items.len(), in_flight, "Buffer persisted");
        Ok(())
    }

    /// Load the buffer persisted by a previous session (empty if none)
    pub async fn load(&self) -> Result<Vec<QueueItem>> {
        let items: Vec<QueueItem> = match self.store.get(BUFFER_STORAGE_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };

        let in_flight = self
            .store
            .get(IN_FLIGHT_STORAGE_KEY)
            .await?
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        info!(
            items = items.len(),
            previous_in_flight = in_flight,
            "Restored persisted buffer"
        );
        Ok(items)
    }
}
