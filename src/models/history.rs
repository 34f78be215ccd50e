use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Lifecycle transitions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KeyAction {
    Created,
    Extended,
    Disabled,
    Reactivated,
    DealClosed,
    Updated,
    EmailSent,
}

/// Append-only audit entry. Written once per transition, never mutated, and
/// kept even if the referenced key disappears (the reference is purely
/// informational).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyHistoryEntry {
    pub id: String,
    pub key_value: String,
    pub action: KeyAction,
    pub performed_at: i64,
    /// Free-form parameters of the transition, e.g. {"additional_days": 7}
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
