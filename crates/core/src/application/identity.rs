// Anonymous identifier: create-if-absent, persisted in the key-value store
use crate::application::constants::ANONYMOUS_ID_STORAGE_KEY;
use crate::error::Result;
use crate::port::{IdProvider, KeyValueStore};
use std::sync::Arc;
use tracing::info;

pub struct AnonymousIdentity {
    store: Arc<dyn KeyValueStore>,
    id_provider: Arc<dyn IdProvider>,
}

impl AnonymousIdentity {
    pub fn new(store: Arc<dyn KeyValueStore>, id_provider: Arc<dyn IdProvider>) -> Self {
        Self { store, id_provider }
    }

    /// Return the stored identifier, generating and persisting one if absent
    pub async fn get_or_create(&self) -> Result<String> {
        if let Some(serde_json::Value::String(id)) = self.store.get(ANONYMOUS_ID_STORAGE_KEY).await? {
            if !id.is_empty() {
                return Ok(id);
            }
        }

        let id = format!("anon_{}", self.id_provider.generate_id());
        self.store
            .set(ANONYMOUS_ID_STORAGE_KEY, serde_json::Value::String(id.clone()))
            .await?;

        info!(anonymous_id = %id, "Created anonymous identifier");
        Ok(id)
    }
}
