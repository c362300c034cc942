// Queue Item Domain Model

use serde::{Deserialize, Serialize};

/// Queue item ID (UUID v4)
pub type ItemId = String;

/// Flat property bag supplied by call sites
pub type EventData = serde_json::Map<String, serde_json::Value>;

/// Payload field holding the event type name
pub const FIELD_EVENT_TYPE: &str = "event_type";
/// Payload field holding the ISO-8601 timestamp
pub const FIELD_TIMESTAMP: &str = "timestamp";
/// Payload field holding the anonymous user identifier
pub const FIELD_USER_ID: &str = "user_id";

/// Delivery status of a buffered item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Waiting,
    Failed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Processing => write!(f, "processing"),
            ItemStatus::Waiting => write!(f, "waiting"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Priority tier (dispatch preemption order: high > medium > low)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Event payload sent to the collector (flat JSON object)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload(EventData);

impl EventPayload {
    /// Build a payload from caller data plus the common fields.
    ///
    /// Common fields are reserved and overwrite caller-supplied keys of the same name.
    pub fn new(event_type: &str, timestamp: String, user_id: &str, data: EventData) -> Self {
        let mut fields = data;
        fields.insert(FIELD_EVENT_TYPE.to_string(), event_type.into());
        fields.insert(FIELD_TIMESTAMP.to_string(), timestamp.into());
        fields.insert(FIELD_USER_ID.to_string(), user_id.into());
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &EventData {
        &self.0
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone())
    }
}

/// One buffered analytics event awaiting delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    pub event_type: String,
    pub payload: EventPayload,
    pub status: ItemStatus,
    pub retry_count: u32,
    pub priority: Priority,
    pub enqueued_at: i64, // epoch ms
    pub next_retry_at: Option<i64>,
}

impl QueueItem {
    /// Create a new pending item
    ///
    /// # Arguments
    ///
    /// * `id` - Unique item ID (injected, not generated)
    /// * `event_type` - Event type name
    /// * `payload` - Payload with common fields attached
    /// * `priority` - Priority assigned at enqueue (never changes afterwards)
    /// * `enqueued_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        event_type: impl Into<String>,
        payload: EventPayload,
        priority: Priority,
        enqueued_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            payload,
            status: ItemStatus::Pending,
            retry_count: 0,
            priority,
            enqueued_at,
            next_retry_at: None,
        }
    }

    /// Transition Pending -> Processing
    pub fn start(&mut self) -> crate::domain::error::Result<()> {
        if self.status != ItemStatus::Pending {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: ItemStatus::Processing.to_string(),
            });
        }
        self.status = ItemStatus::Processing;
        Ok(())
    }

    /// Transition Processing -> Waiting after a failed attempt
    pub fn wait_for_retry(&mut self, next_retry_at: i64) -> crate::domain::error::Result<()> {
        if self.status != ItemStatus::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: ItemStatus::Waiting.to_string(),
            });
        }
        self.status = ItemStatus::Waiting;
        self.next_retry_at = Some(next_retry_at);
        Ok(())
    }

    /// Transition Waiting -> Pending once the retry delay elapsed
    pub fn ready_for_retry(&mut self) -> crate::domain::error::Result<()> {
        if self.status != ItemStatus::Waiting {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: ItemStatus::Pending.to_string(),
            });
        }
        self.status = ItemStatus::Pending;
        self.next_retry_at = None;
        Ok(())
    }

    /// Mark as terminally failed (never re-dispatched)
    pub fn fail(&mut self) {
        self.status = ItemStatus::Failed;
        self.next_retry_at = None;
    }

    /// Reset an item restored from a previous session.
    ///
    /// In-flight requests and retry timers do not survive a restart.
    pub fn reset_after_restore(&mut self) {
        if matches!(self.status, ItemStatus::Processing | ItemStatus::Waiting) {
            self.status = ItemStatus::Pending;
            self.next_retry_at = None;
        }
    }
}
