// event.rs — Audit event data model.
//
// One event is one line of the JSONL log:
// `{timestamp, event_type, severity, details, signature}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single signed audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC, RFC 3339).
    pub timestamp: DateTime<Utc>,

    /// Event kind, e.g. "override_approved".
    pub event_type: String,

    /// Severity label, e.g. "HIGH".
    pub severity: String,

    /// Arbitrary structured payload.
    #[serde(default)]
    pub details: serde_json::Value,

    /// Lowercase hex HMAC-SHA256 over the other fields.
    pub signature: String,
}
