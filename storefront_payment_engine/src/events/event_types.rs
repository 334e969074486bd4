use spg_common::Gel;

use crate::db_types::Order;

/// Emitted once per order, when the order first transitions into `Paid`. The notification compare-and-set in the
/// database guarantees the "once".
#[derive(Debug, Clone)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted when a refund could not be processed through the gateway and has been queued for an operator to settle
/// by hand.
#[derive(Debug, Clone)]
pub struct ManualRefundEvent {
    pub order: Order,
    /// The amount the operator must return. Equals the remaining refundable amount for a full refund.
    pub amount: Gel,
}

impl ManualRefundEvent {
    pub fn new(order: Order, amount: Gel) -> Self {
        Self { order, amount }
    }
}
