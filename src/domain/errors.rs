use thiserror::Error;

use super::order::OrderStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("No tenant could be resolved for the order")]
    TenantUnresolved,
    #[error("external_id is required for delivery orders")]
    MissingIdempotencyKey,
    #[error("An order with this external_id already exists")]
    DuplicateOrder,
    #[error("Order not found")]
    NotFound,
    #[error("Caller is not allowed to modify this order")]
    Forbidden,
    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order items can no longer be edited")]
    OrderLocked,
    #[error("Order was modified concurrently")]
    VersionConflict,
    #[error("Store error: {0}")]
    Store(String),
}
