use crate::error::{CoreError, CoreResult};
use crate::integrity::checksums::sha256_hex;
use serde::{Deserialize, Serialize};

/// One audited release action, hash-chained to its predecessor so the log
/// is tamper-evident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub ts_utc: String, // RFC3339 UTC string
    pub event_type: String,
    pub review_id: String,
    /// Identity of the output checker (or "system").
    pub actor: String,
    pub details: serde_json::Value,
    pub prev_event_hash: String, // hex 64
    pub event_hash: String,      // hex 64
}

pub const ZERO_HASH_64: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub const OUTPUT_APPROVED: &str = "OUTPUT_APPROVED";
pub const OUTPUT_REJECTED: &str = "OUTPUT_REJECTED";
pub const RELEASE_CREATED: &str = "RELEASE_CREATED";

const EVENT_TYPES: [&str; 3] = [OUTPUT_APPROVED, OUTPUT_REJECTED, RELEASE_CREATED];

// The event envelope is a struct, so its compact JSON serialization is
// already deterministic; the hash covers the envelope with `event_hash`
// forced to the zero digest.
pub fn compute_event_hash(event: &AuditEvent) -> CoreResult<String> {
    let mut e = event.clone();
    e.event_hash = ZERO_HASH_64.to_string();
    let bytes = serde_json::to_vec(&e)?;
    Ok(sha256_hex(&bytes))
}

pub fn finalize_event(mut event: AuditEvent) -> CoreResult<AuditEvent> {
    if event.prev_event_hash.len() != 64
        || !event.prev_event_hash.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(CoreError::InvalidInput(
            "prev_event_hash must be 64 hex chars".to_string(),
        ));
    }
    if !EVENT_TYPES.contains(&event.event_type.as_str()) {
        return Err(CoreError::InvalidInput(format!(
            "unknown event_type {}",
            event.event_type
        )));
    }
    event.event_hash = compute_event_hash(&event)?;
    Ok(event)
}
