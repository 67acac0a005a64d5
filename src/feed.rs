//! In-process change feed for the order collection.
//!
//! Lifecycle writes publish row-level notifications here; the realtime
//! handler forwards them to subscribed surfaces as server-sent events.
//! The feed is an explicitly owned handle created in `main` and passed to
//! its users through app state, so its lifetime is the server's lifetime
//! rather than hidden global state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::order::OrderView;

/// Buffered events per subscriber before slow consumers start lagging.
const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// One row-level mutation notification.
///
/// `columns` carries only the header columns the write touched (the whole
/// header for an insert) and never the item rows; subscribers that need the
/// full projection fetch it over the snapshot API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub order_id: Uuid,
    pub restaurant_id: Uuid,
    pub columns: Map<String, Value>,
}

impl ChangeEvent {
    /// Render as one SSE frame (`event:` + `data:` + blank line).
    pub fn to_sse_frame(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.kind.as_str(), data)
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Best effort: an event with no live subscribers is simply dropped.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn publish_insert(&self, order: &OrderView) {
        self.publish(ChangeEvent {
            kind: ChangeKind::Insert,
            order_id: order.id,
            restaurant_id: order.restaurant_id,
            columns: header_columns(order),
        });
    }

    pub fn publish_update(&self, order: &OrderView, changed: Map<String, Value>) {
        self.publish(ChangeEvent {
            kind: ChangeKind::Update,
            order_id: order.id,
            restaurant_id: order.restaurant_id,
            columns: changed,
        });
    }
}

/// Header columns of an order as a JSON map, without the item rows.
pub fn header_columns(order: &OrderView) -> Map<String, Value> {
    let mut value = match serde_json::to_value(order) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    value.remove("items");
    value
}

/// Incremental column map for an update event.
#[derive(Default)]
pub struct ColumnSet(Map<String, Value>);

impl ColumnSet {
    pub fn set(mut self, column: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.0.insert(column.to_string(), v);
        }
        self
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}
