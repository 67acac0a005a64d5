//! Kitchen display surface.
//!
//! The kitchen terminal carries no identity token; it is scoped purely by
//! the restaurant id in the query string and is limited to reading pending
//! tickets and marking them ready.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::orders::OrderResponse;
use crate::webhook::WebhookDispatcher;
use crate::LifecycleService;

#[derive(Debug, Deserialize, ToSchema)]
pub struct KitchenQuery {
    pub restaurant_id: Uuid,
}

/// GET /kitchen/orders
///
/// Pending dine-in/takeout tickets for one restaurant, oldest first, items
/// included. This is the endpoint the kitchen poller hits on its interval.
#[utoipa::path(
    get,
    path = "/kitchen/orders",
    params(("restaurant_id" = Uuid, Query, description = "Tenant to read tickets for")),
    responses(
        (status = 200, description = "Pending tickets", body = [OrderResponse]),
        (status = 500, description = "Internal server error"),
    ),
    tag = "kitchen"
)]
pub async fn list_tickets(
    service: web::Data<LifecycleService>,
    query: web::Query<KitchenQuery>,
) -> Result<HttpResponse, AppError> {
    let restaurant_id = query.into_inner().restaurant_id;

    let tickets = web::block(move || service.pending_tickets(restaurant_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<OrderResponse> = tickets.into_iter().map(OrderResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /kitchen/orders/{id}/ready
///
/// The single transition the unauthenticated surface may perform: mark a
/// ticket ready for pickup. Fires the ready webhook like any other path
/// into that status.
#[utoipa::path(
    post,
    path = "/kitchen/orders/{id}/ready",
    params(
        ("id" = Uuid, Path, description = "Ticket (order) UUID"),
        ("restaurant_id" = Uuid, Query, description = "Tenant the ticket must belong to"),
    ),
    responses(
        (status = 200, description = "Ticket marked ready", body = OrderResponse),
        (status = 400, description = "Ticket is not in a markable state"),
        (status = 404, description = "Unknown ticket for this restaurant"),
    ),
    tag = "kitchen"
)]
pub async fn mark_ticket_ready(
    service: web::Data<LifecycleService>,
    webhook: web::Data<WebhookDispatcher>,
    path: web::Path<Uuid>,
    query: web::Query<KitchenQuery>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let restaurant_id = query.into_inner().restaurant_id;

    let outcome = web::block(move || service.mark_ready(order_id, restaurant_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    if outcome.became_ready {
        webhook.notify_ready(&outcome.order);
    }
    Ok(HttpResponse::Ok().json(OrderResponse::from(outcome.order)))
}
