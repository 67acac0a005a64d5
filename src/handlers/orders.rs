use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    CreateOrderInput, OrderItemInput, OrderItemView, OrderStatus, OrderType, OrderView,
    PaymentStatus, ReplaceItemsInput, RiderPatch, TransitionPatch,
};
use crate::domain::ports::ListFilter;
use crate::errors::AppError;
use crate::handlers::identity::Identity;
use crate::webhook::WebhookDispatcher;
use crate::LifecycleService;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    /// Decimal, accepted as JSON number or string (e.g. 9.99 or "9.99").
    #[schema(value_type = String)]
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Idempotency key; mandatory for delivery (and untyped automation) input.
    pub external_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub items: Vec<OrderItemRequest>,
    #[schema(value_type = Option<String>)]
    pub total_amount: Option<BigDecimal>,
    pub payment_method: Option<String>,
    pub order_type: Option<OrderType>,
    pub waiter_id: Option<Uuid>,
    pub table_number: Option<String>,
    pub scheduled_delivery_time: Option<DateTime<Utc>>,
    pub restaurant_id: Option<Uuid>,
}

impl From<CreateOrderRequest> for CreateOrderInput {
    fn from(req: CreateOrderRequest) -> Self {
        CreateOrderInput {
            external_id: req.external_id,
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
            customer_address: req.customer_address,
            items: req.items.into_iter().map(OrderItemInput::from).collect(),
            total_amount: req.total_amount,
            payment_method: req.payment_method,
            order_type: req.order_type,
            waiter_id: req.waiter_id,
            table_number: req.table_number,
            scheduled_delivery_time: req.scheduled_delivery_time,
            restaurant_id: req.restaurant_id,
        }
    }
}

impl From<OrderItemRequest> for OrderItemInput {
    fn from(req: OrderItemRequest) -> Self {
        OrderItemInput {
            product_id: req.product_id,
            product_name: req.product_name,
            quantity: req.quantity,
            unit_price: req.unit_price,
        }
    }
}

/// Partial lifecycle patch. Omitted fields stay untouched; an empty
/// `assigned_rider_id` string clears the assignment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub assigned_rider_id: Option<String>,
    /// Optimistic concurrency token; a stale value is answered with 409.
    pub expected_version: Option<i64>,
}

impl TransitionRequest {
    fn into_patch(self) -> Result<TransitionPatch, DomainError> {
        let status = self
            .status
            .map(|raw| raw.parse::<OrderStatus>())
            .transpose()?;
        let payment_status = self
            .payment_status
            .map(|raw| raw.parse::<PaymentStatus>())
            .transpose()?;
        let rider = match self.assigned_rider_id.as_deref() {
            None => RiderPatch::Keep,
            Some(raw) if raw.trim().is_empty() => RiderPatch::Clear,
            Some(raw) => RiderPatch::Assign(Uuid::parse_str(raw).map_err(|_| {
                DomainError::Validation(format!("invalid rider id '{raw}'"))
            })?),
        };
        Ok(TransitionPatch {
            status,
            payment_status,
            rider,
            expected_version: self.expected_version,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceOrderRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

impl From<ReplaceOrderRequest> for ReplaceItemsInput {
    fn from(req: ReplaceOrderRequest) -> Self {
        ReplaceItemsInput {
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
            customer_address: req.customer_address,
            items: req.items.into_iter().map(OrderItemInput::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: BigDecimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
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
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    pub payment_method: Option<String>,
    #[schema(value_type = Option<String>)]
    pub scheduled_delivery_time: Option<DateTime<Utc>>,
    pub version: i64,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(order: OrderView) -> Self {
        OrderResponse {
            id: order.id,
            external_id: order.external_id,
            restaurant_id: order.restaurant_id,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            customer_address: order.customer_address,
            status: order.status,
            payment_status: order.payment_status,
            order_type: order.order_type,
            table_number: order.table_number,
            waiter_id: order.waiter_id,
            assigned_rider_id: order.assigned_rider_id,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            scheduled_delivery_time: order.scheduled_delivery_time,
            version: order.version,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: order.items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

impl From<OrderItemView> for OrderItemResponse {
    fn from(item: OrderItemView) -> Self {
        OrderItemResponse {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Optional display filter on the lifecycle status.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderEventResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub event_type: String,
    pub description: String,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Ingestion entry point shared by the admin surface and the upstream
/// automation system. The order header, its items and the creation audit
/// event are committed in one transaction; a repeated external_id answers
/// 409 and the caller should treat the order as already ingested.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Validation, tenant or idempotency-key failure"),
        (status = 409, description = "external_id already ingested"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<LifecycleService>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let input = CreateOrderInput::from(body.into_inner());

    let order = web::block(move || service.create(input))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// GET /orders
///
/// Point-in-time snapshot for an authenticated surface: scoped to the
/// caller's tenant and role, newest first, items included. Surfaces seed
/// their local state from this before merging live feed events.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("status" = Option<String>, Query, description = "Display filter on status"),
    ),
    responses(
        (status = 200, description = "Ordered snapshot", body = SnapshotResponse),
        (status = 403, description = "Missing or malformed identity assertions"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    service: web::Data<LifecycleService>,
    identity: Identity,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let status = query
        .into_inner()
        .status
        .map(|raw| raw.parse::<OrderStatus>())
        .transpose()
        .map_err(AppError::from)?;
    let filter = ListFilter {
        restaurant_id: identity.restaurant_id,
        scope: identity.scope(),
        status,
    };

    let orders = web::block(move || service.list_orders(&filter))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let items: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    let total = items.len() as i64;
    Ok(HttpResponse::Ok().json(SnapshotResponse { items, total }))
}

/// GET /orders/{id}
///
/// Full relational projection of one order. Feed subscribers call this
/// after an insert notification, since feed payloads never carry items.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found in the caller's tenant"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<LifecycleService>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = web::block(move || service.get_order(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    match order.filter(|o| o.restaurant_id == identity.restaurant_id) {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
        None => Err(AppError::NotFound),
    }
}

/// PATCH /orders/{id}
///
/// Applies status/payment/rider changes. Delivered orders are forcibly
/// marked paid; a transition into finalizado fires the ready webhook after
/// the commit, never affecting this response.
#[utoipa::path(
    patch,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Patched order", body = OrderResponse),
        (status = 400, description = "Illegal edge or invalid field"),
        (status = 404, description = "Order not found in the caller's tenant"),
        (status = 409, description = "Lost optimistic-concurrency race"),
    ),
    tag = "orders"
)]
pub async fn transition_order(
    service: web::Data<LifecycleService>,
    webhook: web::Data<WebhookDispatcher>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<TransitionRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let patch = body.into_inner().into_patch()?;
    let restaurant_id = identity.restaurant_id;

    let outcome = web::block(move || service.transition_scoped(restaurant_id, order_id, patch))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    if outcome.became_ready {
        webhook.notify_ready(&outcome.order);
    }
    Ok(HttpResponse::Ok().json(OrderResponse::from(outcome.order)))
}

/// PUT /orders/{id}/items
///
/// Full replace of the customer fields and the item set. Wait staff may
/// only edit orders they own and only while the order is still open.
#[utoipa::path(
    put,
    path = "/orders/{id}/items",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = ReplaceOrderRequest,
    responses(
        (status = 200, description = "Order with the replacement items", body = OrderResponse),
        (status = 400, description = "Order locked or invalid items"),
        (status = 403, description = "Caller does not own the order"),
        (status = 404, description = "Order not found in the caller's tenant"),
    ),
    tag = "orders"
)]
pub async fn replace_order_items(
    service: web::Data<LifecycleService>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<ReplaceOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let input = ReplaceItemsInput::from(body.into_inner());
    let caller = identity.edit_caller();
    let restaurant_id = identity.restaurant_id;

    let order =
        web::block(move || service.replace_items_scoped(restaurant_id, order_id, caller, input))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /orders/{id}/events
///
/// Append-only audit trail, oldest first.
#[utoipa::path(
    get,
    path = "/orders/{id}/events",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Audit events", body = [OrderEventResponse]),
        (status = 404, description = "Order not found in the caller's tenant"),
    ),
    tag = "orders"
)]
pub async fn list_order_events(
    service: web::Data<LifecycleService>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let restaurant_id = identity.restaurant_id;

    let events = web::block(move || {
        let order = service.get_order(order_id)?.ok_or(DomainError::NotFound)?;
        if order.restaurant_id != restaurant_id {
            return Err(DomainError::NotFound);
        }
        service.order_events(order_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<OrderEventResponse> = events
        .into_iter()
        .map(|e| OrderEventResponse {
            id: e.id,
            order_id: e.order_id,
            event_type: e.event_type,
            description: e.description,
            created_at: e.created_at,
        })
        .collect();
    Ok(HttpResponse::Ok().json(body))
}
