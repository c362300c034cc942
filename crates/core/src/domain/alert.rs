// System Alert Domain Model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Alert classes emitted out-of-band by the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Priority pruning removed buffered items
    QueuePruned,
    /// Hard-cap eviction dropped the oldest item
    QueueOverflow,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::QueuePruned => "queue_pruned",
            AlertKind::QueueOverflow => "queue_overflow",
        }
    }
}

/// Out-of-band diagnostic payload (never buffered)
#[derive(Debug, Clone, PartialEq)]
pub struct SystemAlert {
    pub kind: AlertKind,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl SystemAlert {
    pub fn new(kind: AlertKind, details: serde_json::Value) -> Self {
        let details = match details {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("detail".to_string(), other);
                map
            }
        };
        Self { kind, details }
    }

    pub fn to_payload(&self, timestamp: String) -> serde_json::Value {
        let mut fields = self.details.clone();
        fields.insert("type".to_string(), "system_alert".into());
        fields.insert("alert_type".to_string(), self.kind.as_str().into());
        fields.insert("timestamp".to_string(), timestamp.into());
        serde_json::Value::Object(fields)
    }
}

/// Per-kind alert rate limiting
#[derive(Debug, Clone)]
pub struct AlertCooldown {
    cooldown_ms: i64,
    last_sent: HashMap<AlertKind, i64>,
}

impl AlertCooldown {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms: i64::try_from(cooldown_ms).unwrap_or(i64::MAX),
            last_sent: HashMap::new(),
        }
    }

    /// Returns true (and records `now`) if an alert of `kind` may be sent
    pub fn try_acquire(&mut self, kind: AlertKind, now_millis: i64) -> bool {
        if let Some(last) = self.last_sent.get(&kind) {
            if now_millis - last < self.cooldown_ms {
                return false;
            }
        }
        self.last_sent.insert(kind, now_millis);
        true
    }
}
