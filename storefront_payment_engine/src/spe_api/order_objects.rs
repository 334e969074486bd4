use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, OrderStatusType};

/// A composable filter for order searches. Empty filters match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub statuses: Vec<OrderStatusType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Only orders that have a gateway checkout session attached.
    #[serde(default)]
    pub with_gateway_session: bool,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_customer_phone(mut self, phone: String) -> Self {
        self.customer_phone = Some(phone);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_gateway_session(mut self) -> Self {
        self.with_gateway_session = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.customer_phone.is_none()
            && self.statuses.is_empty()
            && self.since.is_none()
            && self.until.is_none()
            && !self.with_gateway_session
    }
}

/// The outcome of one reconciliation pass against the gateway.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub examined: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Orders the gateway could not be queried for, with the reason.
    pub failures: Vec<(OrderId, String)>,
}
