use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single notification row, shared by the REST and push representations.
///
/// `id` is server-assigned and stable across both sources; the store keys
/// everything on it. `kind` is the domain category (`shopping_list`,
/// `expense_group`, `expense`, ...) and `reference_id`/`reference_type`
/// point at the related entity for click-through navigation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reference_id: Option<i64>,
    #[serde(default)]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Inbound push frame envelope. The discriminator lives on the envelope so
/// it cannot collide with the record's own `type` field.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamFrameWire {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) notification: Option<Notification>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnreadCountWire {
    pub(crate) count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MarkReadWire {
    pub(crate) is_read: bool,
}

/// Typed event produced by the stream decoder.
#[derive(Debug, Clone)]
pub(crate) enum StreamEvent {
    Notification(Notification),
    Pong,
}

/// Lifecycle of the push connection, owned by the stream supervisor and
/// consumed read-only by UI indicators.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Errored => "Errored",
        }
    }
}

/// Snapshot of the reconciliation store published to subscribers after every
/// confirmed mutation. `unread` is always derived from `notifications`.
#[derive(Debug, Serialize, Clone, Default)]
pub struct StoreView {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}
