use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::GatewayClientError,
};

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} already exists")]
    OrderAlreadyExists(OrderId),
    #[error("Order {0} was not found")]
    OrderNotFound(OrderId),
    #[error("Order {0} is malformed: {1}")]
    InvalidOrder(OrderId, String),
    #[error("Order {order_id} cannot be refunded from status '{status}'")]
    OrderNotRefundable { order_id: OrderId, status: OrderStatusType },
    #[error("The refund window for order {order_id} closed {days_late} day(s) ago")]
    RefundWindowExpired { order_id: OrderId, days_late: i64 },
    #[error("Invalid refund amount: {0}")]
    InvalidRefundAmount(String),
    #[error("Order {order_id} cannot move from '{from}' to '{to}'")]
    InvalidStatusChange { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Gateway error: {0}")]
    GatewayError(#[from] GatewayClientError),
}

impl PaymentFlowError {
    pub fn db<E: std::error::Error>(e: E) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Unknown admin user")]
    UserNotFound,
}
