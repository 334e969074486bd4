use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment, RefundDetail},
    spe_api::order_objects::OrderQueryFilter,
    traits::{InsertOrderResult, InsertPaymentResult},
};

/// The storage contract for the payment engine.
///
/// Backends are responsible for durability and atomicity of the individual operations; the ordering of operations
/// and the lifecycle rules live in [`PaymentFlowApi`](crate::PaymentFlowApi).
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The URL of the database.
    fn url(&self) -> &str;

    /// Insert a new order. Inserting an order id that already exists is not an error; the existing row id is
    /// returned and nothing is written.
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error>;

    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, Self::Error>;

    /// Look an order up by the gateway's id for it. Used when a notification arrives without the storefront id.
    async fn fetch_order_by_gateway_id(&self, gateway_order_id: &str) -> Result<Option<Order>, Self::Error>;

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, Self::Error>;

    /// Write a new status for the order and return the updated row. The caller is responsible for having checked
    /// the transition with [`OrderStatusType::can_transition_to`].
    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, Self::Error>;

    /// Record the gateway checkout session created for the order.
    async fn attach_gateway_session(
        &self,
        order_id: &OrderId,
        gateway_order_id: &str,
        payment_url: &str,
    ) -> Result<(), Self::Error>;

    /// Record a payment notification in the audit trail. Inserting a duplicate (same order, transaction id and
    /// status) is not an error.
    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, Self::Error>;

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, Self::Error>;

    async fn fetch_payments(&self, limit: i64) -> Result<Vec<Payment>, Self::Error>;

    /// Atomically claim the right to send the one-and-only paid notification for this order. Returns `true` for
    /// exactly one caller; concurrent webhook deliveries all lose except one.
    async fn acquire_notification_slot(&self, order_id: &OrderId) -> Result<bool, Self::Error>;

    /// Replace the refund bookkeeping document on the order.
    async fn set_refund_detail(&self, order_id: &OrderId, detail: &RefundDetail) -> Result<(), Self::Error>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
