use serde_json::Value;
use spg_common::Gel;
use thiserror::Error;

use crate::db_types::{NewOrder, OrderId};

/// The outbound payment gateway contract.
///
/// The engine never talks HTTP itself. The server wires in a concrete client (the iPay client in production, a
/// scripted one in tests), and the engine only cares about three capabilities: opening a checkout session, querying
/// the remote state of an order, and asking for money back.
#[allow(async_fn_in_trait)]
pub trait GatewayClient: Clone {
    /// Create a remote checkout session for the order and return the payment page the customer should be sent to.
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayClientError>;

    /// Fetch the gateway's current view of an order.
    async fn fetch_remote_status(&self, gateway_order_id: &str) -> Result<RemoteStatus, GatewayClientError>;

    /// Request a refund. `amount` is `None` for a full refund. The `idempotency_key` must be stable across retries
    /// of the same logical refund so that a network blip cannot double-refund.
    async fn refund(
        &self,
        gateway_order_id: &str,
        order_id: &OrderId,
        amount: Option<Gel>,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayClientError>;
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order: NewOrder,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub gateway_order_id: String,
    pub payment_url: String,
}

#[derive(Debug, Clone)]
pub struct RemoteStatus {
    /// The raw status text, to be run through [`crate::status::resolve`].
    pub status_text: String,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub action_id: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayClientError {
    #[error("Gateway credentials are not configured")]
    NotConfigured,
    #[error("Gateway could not be reached: {0}")]
    Unavailable(String),
    #[error("Gateway rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("Gateway exposes no working refund endpoint: {0}")]
    RefundUnsupported(String),
    #[error("Gateway response could not be interpreted: {0}")]
    InvalidResponse(String),
}

impl GatewayClientError {
    /// Whether a refund failure should fall back to manual processing rather than being reported as a hard error.
    /// A rejection is the gateway answering "no"; everything else is the gateway failing to answer.
    pub fn warrants_manual_refund(&self) -> bool {
        !matches!(self, GatewayClientError::Rejected { .. })
    }
}
