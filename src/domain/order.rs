use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::errors::DomainError;

/// Lifecycle status of an order.
///
/// The set is closed: transitions are restricted to the edges in
/// [`OrderStatus::can_transition_to`] and anything else is rejected with
/// [`DomainError::IllegalTransition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pendiente,
    EnProceso,
    Finalizado,
    Entregado,
    Cancelado,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pendiente => "pendiente",
            OrderStatus::EnProceso => "en_proceso",
            OrderStatus::Finalizado => "finalizado",
            OrderStatus::Entregado => "entregado",
            OrderStatus::Cancelado => "cancelado",
        }
    }

    /// The directed edges of the status machine.
    ///
    /// `Pendiente -> Finalizado` is the kitchen fast path: the kitchen
    /// display marks a pending ticket ready in a single call.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Pendiente, EnProceso)
                | (Pendiente, Finalizado)
                | (Pendiente, Cancelado)
                | (EnProceso, Finalizado)
                | (EnProceso, Cancelado)
                | (Finalizado, Entregado)
        )
    }

    /// Statuses during which wait staff may still edit the item set.
    pub fn allows_item_edits(&self) -> bool {
        matches!(self, OrderStatus::Pendiente | OrderStatus::EnProceso)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente" => Ok(OrderStatus::Pendiente),
            "en_proceso" => Ok(OrderStatus::EnProceso),
            "finalizado" => Ok(OrderStatus::Finalizado),
            "entregado" => Ok(OrderStatus::Entregado),
            "cancelado" => Ok(OrderStatus::Cancelado),
            other => Err(DomainError::Validation(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pendiente,
    Pagado,
    Cancelado,
    Reembolsado,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pendiente => "pendiente",
            PaymentStatus::Pagado => "pagado",
            PaymentStatus::Cancelado => "cancelado",
            PaymentStatus::Reembolsado => "reembolsado",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente" => Ok(PaymentStatus::Pendiente),
            "pagado" => Ok(PaymentStatus::Pagado),
            "cancelado" => Ok(PaymentStatus::Cancelado),
            "reembolsado" => Ok(PaymentStatus::Reembolsado),
            other => Err(DomainError::InvalidPaymentStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Delivery,
    DineIn,
    Takeout,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Delivery => "delivery",
            OrderType::DineIn => "dine_in",
            OrderType::Takeout => "takeout",
        }
    }

    /// Kitchen tickets only cover orders prepared for the dining room.
    pub fn is_kitchen_ticket(&self) -> bool {
        matches!(self, OrderType::DineIn | OrderType::Takeout)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(OrderType::Delivery),
            "dine_in" => Ok(OrderType::DineIn),
            "takeout" => Ok(OrderType::Takeout),
            other => Err(DomainError::Validation(format!(
                "unknown order type '{other}'"
            ))),
        }
    }
}

// ── Views ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

/// Full relational projection of one order, items included.
///
/// This is the shape returned by every read path so that snapshot fetches
/// and per-row fetches stay interchangeable on the client side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
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
    pub assigned_rider_id: Option<Uuid>,
    pub total_amount: BigDecimal,
    pub payment_method: Option<String>,
    pub scheduled_delivery_time: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone)]
pub struct OrderEventView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub event_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ── Inputs ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrderItemInput {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOrderInput {
    pub external_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub items: Vec<OrderItemInput>,
    pub total_amount: Option<BigDecimal>,
    pub payment_method: Option<String>,
    pub order_type: Option<OrderType>,
    pub waiter_id: Option<Uuid>,
    pub table_number: Option<String>,
    pub scheduled_delivery_time: Option<DateTime<Utc>>,
    pub restaurant_id: Option<Uuid>,
}

/// Rider assignment patch: `Keep` when the field is omitted, `Clear` for the
/// empty-string sentinel, `Assign` for an explicit rider id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiderPatch {
    #[default]
    Keep,
    Clear,
    Assign(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct TransitionPatch {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub rider: RiderPatch,
    /// Compare-and-swap token; when absent the service still guards the
    /// write against the version it read.
    pub expected_version: Option<i64>,
}

impl TransitionPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.payment_status.is_none() && self.rider == RiderPatch::Keep
    }
}

#[derive(Debug, Clone)]
pub struct ReplaceItemsInput {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub items: Vec<OrderItemInput>,
}
