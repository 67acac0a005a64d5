use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{
    OrderEventView, OrderItemInput, OrderStatus, OrderType, OrderView, PaymentStatus,
};

/// Fully resolved order header, ready to insert.
#[derive(Debug, Clone)]
pub struct NewOrderRecord {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub restaurant_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub order_type: OrderType,
    pub table_number: Option<String>,
    pub waiter_id: Option<Uuid>,
    pub total_amount: BigDecimal,
    pub payment_method: Option<String>,
    pub scheduled_delivery_time: Option<DateTime<Utc>>,
}

/// Audit entry appended alongside a lifecycle write.
#[derive(Debug, Clone)]
pub struct NewOrderEvent {
    pub event_type: String,
    pub description: String,
}

impl NewOrderEvent {
    pub fn new(event_type: &str, description: impl Into<String>) -> Self {
        Self {
            event_type: event_type.to_string(),
            description: description.into(),
        }
    }
}

/// Validated transition, applied as one conditional write.
///
/// `rider` uses the double-option convention: `None` keeps the current
/// assignment, `Some(None)` clears it, `Some(Some(id))` assigns.
/// `guard_version` is the version the service read; the update is a
/// compare-and-swap against it.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub rider: Option<Option<Uuid>>,
    pub guard_version: i64,
    pub events: Vec<NewOrderEvent>,
}

#[derive(Debug, Clone)]
pub struct ReplaceItemsRecord {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub items: Vec<OrderItemInput>,
    pub guard_version: i64,
    pub event: NewOrderEvent,
}

/// Role-derived slice of the tenant's order collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewScope {
    All,
    DiningRoom,
    Delivery,
}

impl ViewScope {
    pub fn order_types(&self) -> Option<&'static [OrderType]> {
        match self {
            ViewScope::All => None,
            ViewScope::DiningRoom => Some(&[OrderType::DineIn, OrderType::Takeout]),
            ViewScope::Delivery => Some(&[OrderType::Delivery]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListFilter {
    pub restaurant_id: Uuid,
    pub scope: ViewScope,
    pub status: Option<OrderStatus>,
}

pub trait OrderRepository: Send + Sync + 'static {
    /// Insert header, items and the creation event in a single transaction.
    fn create(
        &self,
        order: NewOrderRecord,
        items: Vec<OrderItemInput>,
        event: NewOrderEvent,
    ) -> Result<OrderView, DomainError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;

    /// Tenant- and role-scoped snapshot, newest first, items included.
    fn list(&self, filter: &ListFilter) -> Result<Vec<OrderView>, DomainError>;

    /// Pending dine-in/takeout tickets for the kitchen display, oldest first.
    fn pending_tickets(&self, restaurant_id: Uuid) -> Result<Vec<OrderView>, DomainError>;

    /// Conditional update of status/payment/rider plus audit events.
    fn apply_transition(&self, id: Uuid, record: TransitionRecord)
        -> Result<OrderView, DomainError>;

    /// Delete-then-reinsert of the item set plus the customer fields.
    fn replace_items(&self, id: Uuid, record: ReplaceItemsRecord)
        -> Result<OrderView, DomainError>;

    fn events_for(&self, order_id: Uuid) -> Result<Vec<OrderEventView>, DomainError>;

    // Tenant resolution lookups.
    fn waiter_restaurant(&self, waiter_id: Uuid) -> Result<Option<Uuid>, DomainError>;
    fn product_restaurant(&self, product_id: Uuid) -> Result<Option<Uuid>, DomainError>;
    fn restaurant_is_active(&self, restaurant_id: Uuid) -> Result<bool, DomainError>;
}
