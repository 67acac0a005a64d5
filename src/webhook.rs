//! Best-effort "order ready" notification to the upstream automation system.
//!
//! The dispatch is fire-and-forget: the transition that triggered it has
//! already committed, and nothing here may delay or fail that caller.
//! Delivery problems are logged and dropped.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::order::{OrderItemView, OrderView};

/// Placeholder contact the upstream automation uses when the customer
/// channel is unknown. It never identifies a deliverable chat.
pub const UNKNOWN_CONTACT: &str = "sin-numero";

#[derive(Debug, Clone, Serialize)]
pub struct ReadyItem {
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyNotification {
    pub order_id: Uuid,
    pub external_id: Option<String>,
    pub chat_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub status: String,
    pub total_amount: String,
    pub payment_method: Option<String>,
    pub payment_status: String,
    pub order_type: String,
    pub created_at: String,
    pub items: Vec<ReadyItem>,
}

impl ReadyNotification {
    pub fn from_order(order: &OrderView) -> Self {
        Self {
            order_id: order.id,
            external_id: order.external_id.clone(),
            chat_id: derive_chat_id(order.external_id.as_deref(), &order.customer_phone),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            customer_address: order.customer_address.clone(),
            status: order.status.to_string(),
            total_amount: order.total_amount.to_string(),
            payment_method: order.payment_method.clone(),
            payment_status: order.payment_status.to_string(),
            order_type: order.order_type.to_string(),
            created_at: order.created_at.to_rfc3339(),
            items: order.items.iter().map(ReadyItem::from_item).collect(),
        }
    }
}

impl ReadyItem {
    fn from_item(item: &OrderItemView) -> Self {
        Self {
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.to_string(),
        }
    }
}

/// Recover the customer-channel identity the automation system encoded in
/// the idempotency key.
///
/// The key format is `<chat>_<timestamp>`; the prefix wins when it is
/// usable, then the stored phone, then the placeholder itself.
pub fn derive_chat_id(external_id: Option<&str>, customer_phone: &str) -> String {
    if let Some(external) = external_id {
        let prefix = external.split('_').next().unwrap_or("");
        if !prefix.is_empty() && prefix != UNKNOWN_CONTACT {
            return prefix.to_string();
        }
    }
    if customer_phone != UNKNOWN_CONTACT {
        return customer_phone.to_string();
    }
    UNKNOWN_CONTACT.to_string()
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl WebhookDispatcher {
    /// `endpoint = None` disables dispatch entirely; the feature is optional
    /// infrastructure, not a correctness requirement.
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Spawn the POST and return immediately. Must be called from within a
    /// tokio runtime (the HTTP handlers are).
    pub fn notify_ready(&self, order: &OrderView) {
        let Some(url) = self.endpoint.clone() else {
            log::debug!("no ready-webhook endpoint configured, skipping order {}", order.id);
            return;
        };
        let payload = ReadyNotification::from_order(order);
        let client = self.client.clone();
        let order_id = order.id;

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    log::info!("ready webhook delivered for order {order_id}");
                }
                Ok(response) => {
                    log::warn!(
                        "ready webhook for order {order_id} answered {}",
                        response.status()
                    );
                }
                Err(e) => {
                    log::warn!("ready webhook for order {order_id} failed: {e}");
                }
            }
        });
    }
}
