use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{OrderEventView, OrderItemView, OrderView};
use crate::schema::{order_events, order_items, orders};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub restaurant_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub order_type: String,
    pub table_number: Option<String>,
    pub waiter_id: Option<Uuid>,
    pub assigned_rider_id: Option<Uuid>,
    pub total_amount: BigDecimal,
    pub payment_method: Option<String>,
    pub scheduled_delivery_time: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub restaurant_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub order_type: String,
    pub table_number: Option<String>,
    pub waiter_id: Option<Uuid>,
    pub total_amount: BigDecimal,
    pub payment_method: Option<String>,
    pub scheduled_delivery_time: Option<DateTime<Utc>>,
}

/// Conditional transition write. `None` fields are left untouched; the
/// rider field uses the double option so `Some(None)` clears the column.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
pub struct TransitionChangeset {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub assigned_rider_id: Option<Option<Uuid>>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
pub struct CustomerChangeset {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = order_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEventRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub event_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_events)]
pub struct NewOrderEventRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub event_type: String,
    pub description: String,
}

impl OrderRow {
    /// A stored enum token the code no longer knows is a store-level fault,
    /// not caller input.
    pub fn into_view(self, items: Vec<OrderItemRow>) -> Result<OrderView, DomainError> {
        let status = self
            .status
            .parse()
            .map_err(|_| DomainError::Store(format!("invalid stored status '{}'", self.status)))?;
        let payment_status = self.payment_status.parse().map_err(|_| {
            DomainError::Store(format!(
                "invalid stored payment status '{}'",
                self.payment_status
            ))
        })?;
        let order_type = self.order_type.parse().map_err(|_| {
            DomainError::Store(format!("invalid stored order type '{}'", self.order_type))
        })?;

        Ok(OrderView {
            id: self.id,
            external_id: self.external_id,
            restaurant_id: self.restaurant_id,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            customer_address: self.customer_address,
            status,
            payment_status,
            order_type,
            table_number: self.table_number,
            waiter_id: self.waiter_id,
            assigned_rider_id: self.assigned_rider_id,
            total_amount: self.total_amount,
            payment_method: self.payment_method,
            scheduled_delivery_time: self.scheduled_delivery_time,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: items.into_iter().map(OrderItemRow::into_view).collect(),
        })
    }
}

impl OrderItemRow {
    pub fn into_view(self) -> OrderItemView {
        OrderItemView {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}

impl OrderEventRow {
    pub fn into_view(self) -> OrderEventView {
        OrderEventView {
            id: self.id,
            order_id: self.order_id,
            event_type: self.event_type,
            description: self.description,
            created_at: self.created_at,
        }
    }
}
