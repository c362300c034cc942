// Queue constants (No magic values)

/// Store key holding the serialized buffer
pub const BUFFER_STORAGE_KEY: &str = "pulse_event_queue";

/// Store key holding the in-flight counter snapshot
pub const IN_FLIGHT_STORAGE_KEY: &str = "pulse_event_queue_processing";

/// Store key holding the anonymous user identifier
pub const ANONYMOUS_ID_STORAGE_KEY: &str = "pulse_anonymous_id";
