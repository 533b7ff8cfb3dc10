// Linkauth — Audit event payloads
//
// Fixed-shape records published on the log channel, one per credential
// store operation. The `action` tag and field names are the wire format
// consumed by downstream log subscribers.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action")]
pub enum AuditEvent {
    #[serde(rename = "user:exists")]
    Exists {
        username: String,
        #[serde(rename = "exists?")]
        exists: bool,
    },

    #[serde(rename = "user:authorized")]
    Authorized {
        username: String,
        system: Option<bool>,
    },

    #[serde(rename = "user:failed-authorize")]
    Failed {
        username: String,
        system: Option<bool>,
    },

    #[serde(rename = "user:added")]
    Added { username: String },

    #[serde(rename = "user:removed")]
    Removed { username: String },

    #[serde(rename = "user:viewed-listing")]
    ViewedListing,

    #[serde(rename = "user:viewed")]
    Viewed { username: String },

    #[serde(rename = "user:viewed-field")]
    ViewedField { username: String, field: Vec<String> },

    #[serde(rename = "user:changed-field")]
    Changed { username: String, field: Vec<String> },
}

impl AuditEvent {
    /// The `action` tag as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            AuditEvent::Exists { .. } => "user:exists",
            AuditEvent::Authorized { .. } => "user:authorized",
            AuditEvent::Failed { .. } => "user:failed-authorize",
            AuditEvent::Added { .. } => "user:added",
            AuditEvent::Removed { .. } => "user:removed",
            AuditEvent::ViewedListing => "user:viewed-listing",
            AuditEvent::Viewed { .. } => "user:viewed",
            AuditEvent::ViewedField { .. } => "user:viewed-field",
            AuditEvent::Changed { .. } => "user:changed-field",
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
