//! 同步消息类型定义
//!
//! Messages published on the broadcast channel after every draft mutation.
//! A message is a wake-up hint: readers re-read the local store and never
//! project the payload directly.
//!
//! Wire shape:
//!
//! ```text
//! { "event": "item_added", "orderId": "...", "scopeId": "takeout_c1",
//!   "payload": { ... }, "timestamp": "2024-05-01T10:00:00Z" }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::order::ScopeId;

/// Draft mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrderCreated,
    OrderUpdated,
    OrderDeleted,
    ItemAdded,
    ItemUpdated,
    ItemRemoved,
    OrderConfirmed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "order_created",
            EventKind::OrderUpdated => "order_updated",
            EventKind::OrderDeleted => "order_deleted",
            EventKind::ItemAdded => "item_added",
            EventKind::ItemUpdated => "item_updated",
            EventKind::ItemRemoved => "item_removed",
            EventKind::OrderConfirmed => "order_confirmed",
        }
    }

    /// Item-level events (as opposed to order-level)
    pub fn is_item_event(&self) -> bool {
        matches!(
            self,
            EventKind::ItemAdded | EventKind::ItemUpdated | EventKind::ItemRemoved
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message carried by the broadcast channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    pub event: EventKind,
    pub order_id: String,
    pub scope_id: ScopeId,
    /// Advisory only
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl SyncMessage {
    pub fn new(
        event: EventKind,
        order_id: impl Into<String>,
        scope_id: ScopeId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event,
            order_id: order_id.into(),
            scope_id,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn matches_scope(&self, scope: &ScopeId) -> bool {
        &self.scope_id == scope
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
