//! In-memory stand-ins for the database and the gateway client.
//!
//! [`MemoryDatabase`] implements the storage traits over a mutex-guarded `Vec`, and [`ScriptedGateway`] answers
//! gateway calls from a programmable script while counting what was called with what.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};
use spg_common::Gel;
use thiserror::Error;

use crate::{
    db_types::{AdminUser, NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment, RefundDetail},
    spe_api::{errors::AuthApiError, order_objects::OrderQueryFilter},
    traits::{
        AuthManagement,
        CheckoutRequest,
        CheckoutSession,
        GatewayClient,
        GatewayClientError,
        InsertOrderResult,
        InsertPaymentResult,
        PaymentGatewayDatabase,
        RefundReceipt,
        RemoteStatus,
    },
};

#[derive(Debug, Clone, Error)]
pub enum MemoryDatabaseError {
    #[error("Order {0} was not found")]
    OrderNotFound(OrderId),
}

#[derive(Default)]
struct MemoryState {
    orders: Vec<Order>,
    payments: Vec<Payment>,
    admins: HashMap<String, AdminUser>,
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift an order's creation time into the past. Lets tests age an order beyond the refund window.
    pub fn backdate_order(&self, order_id: &OrderId, days: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some(order) = state.orders.iter_mut().find(|o| &o.order_id == order_id) {
            order.created_at -= Duration::days(days);
        }
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }

    pub fn payment_count(&self) -> usize {
        self.state.lock().unwrap().payments.len()
    }
}

impl PaymentGatewayDatabase for MemoryDatabase {
    type Error = MemoryDatabaseError;

    fn url(&self) -> &str {
        "memory://"
    }

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.orders.iter().find(|o| o.order_id == order.order_id) {
            return Ok(InsertOrderResult::AlreadyExists(existing.id));
        }
        let id = state.orders.len() as i64 + 1;
        let now = Utc::now();
        state.orders.push(Order {
            id,
            order_id: order.order_id,
            first_name: order.first_name,
            last_name: order.last_name,
            customer_phone: order.customer_phone,
            delivery_address: order.delivery_address,
            location: order.location,
            items: order.items,
            total_price: order.total_price,
            currency: order.currency,
            status: OrderStatusType::Pending,
            gateway_order_id: None,
            payment_url: None,
            notification_sent: false,
            refund_detail: None,
            created_at: now,
            updated_at: now,
        });
        Ok(InsertOrderResult::Inserted(id))
    }

    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.orders.iter().find(|o| &o.order_id == order_id).cloned())
    }

    async fn fetch_order_by_gateway_id(&self, gateway_order_id: &str) -> Result<Option<Order>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.orders.iter().find(|o| o.gateway_order_id.as_deref() == Some(gateway_order_id)).cloned())
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, Self::Error> {
        let state = self.state.lock().unwrap();
        let orders = state
            .orders
            .iter()
            .filter(|o| filter.order_id.as_ref().map_or(true, |id| &o.order_id == id))
            .filter(|o| filter.customer_phone.as_ref().map_or(true, |p| &o.customer_phone == p))
            .filter(|o| filter.statuses.is_empty() || filter.statuses.contains(&o.status))
            .filter(|o| filter.since.map_or(true, |t| o.created_at >= t))
            .filter(|o| filter.until.map_or(true, |t| o.created_at <= t))
            .filter(|o| !filter.with_gateway_session || o.gateway_order_id.is_some())
            .cloned()
            .collect();
        Ok(orders)
    }

    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, Self::Error> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.order_id == order_id)
            .ok_or_else(|| MemoryDatabaseError::OrderNotFound(order_id.clone()))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn attach_gateway_session(
        &self,
        order_id: &OrderId,
        gateway_order_id: &str,
        payment_url: &str,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.order_id == order_id)
            .ok_or_else(|| MemoryDatabaseError::OrderNotFound(order_id.clone()))?;
        order.gateway_order_id = Some(gateway_order_id.to_string());
        order.payment_url = Some(payment_url.to_string());
        Ok(())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, Self::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.payments.iter().find(|p| {
            p.order_id == payment.order_id
                && p.status == payment.status
                && p.transaction_id == payment.transaction_id
        }) {
            return Ok(InsertPaymentResult::AlreadyExists(existing.id));
        }
        let id = state.payments.len() as i64 + 1;
        state.payments.push(Payment {
            id,
            order_id: payment.order_id,
            gateway_order_id: payment.gateway_order_id,
            transaction_id: payment.transaction_id,
            amount: payment.amount,
            status: payment.status,
            payment_method: payment.payment_method,
            raw_payload: payment.raw_payload,
            created_at: Utc::now(),
        });
        Ok(InsertPaymentResult::Inserted(id))
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.payments.iter().filter(|p| &p.order_id == order_id).cloned().collect())
    }

    async fn fetch_payments(&self, limit: i64) -> Result<Vec<Payment>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.payments.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn acquire_notification_slot(&self, order_id: &OrderId) -> Result<bool, Self::Error> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.order_id == order_id)
            .ok_or_else(|| MemoryDatabaseError::OrderNotFound(order_id.clone()))?;
        if order.notification_sent {
            return Ok(false);
        }
        order.notification_sent = true;
        Ok(true)
    }

    async fn set_refund_detail(&self, order_id: &OrderId, detail: &RefundDetail) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.order_id == order_id)
            .ok_or_else(|| MemoryDatabaseError::OrderNotFound(order_id.clone()))?;
        order.refund_detail = Some(detail.clone());
        Ok(())
    }
}

impl AuthManagement for MemoryDatabase {
    async fn fetch_admin_user(&self, username: &str) -> Result<Option<AdminUser>, AuthApiError> {
        let state = self.state.lock().unwrap();
        Ok(state.admins.get(username).cloned())
    }

    async fn upsert_admin_user(&self, username: &str, password_hash: &str) -> Result<(), AuthApiError> {
        let mut state = self.state.lock().unwrap();
        let id = state.admins.len() as i64 + 1;
        let user = AdminUser {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        state.admins.insert(username.to_string(), user);
        Ok(())
    }
}

//--------------------------------------   ScriptedGateway     -------------------------------------------------------
#[derive(Default)]
struct GatewayScript {
    checkout_error: Option<GatewayClientError>,
    refund_error: Option<GatewayClientError>,
    remote_statuses: HashMap<String, RemoteStatus>,
    status_error: Option<GatewayClientError>,
    checkout_calls: u32,
    status_calls: u32,
    refund_calls: u32,
    last_refund: Option<RecordedRefund>,
}

#[derive(Debug, Clone)]
pub struct RecordedRefund {
    pub gateway_order_id: String,
    pub order_id: OrderId,
    pub amount: Option<Gel>,
    pub idempotency_key: String,
}

/// A gateway client that answers from a script. By default every checkout succeeds (with a synthetic session id)
/// and every refund is accepted.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<GatewayScript>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_checkouts_with(&self, error: GatewayClientError) {
        self.script.lock().unwrap().checkout_error = Some(error);
    }

    pub fn fail_refunds_with(&self, error: GatewayClientError) {
        self.script.lock().unwrap().refund_error = Some(error);
    }

    /// Clear a scripted refund failure, as if the gateway came back up.
    pub fn restore_refunds(&self) {
        self.script.lock().unwrap().refund_error = None;
    }

    pub fn fail_status_queries_with(&self, error: GatewayClientError) {
        self.script.lock().unwrap().status_error = Some(error);
    }

    pub fn set_remote_status(&self, gateway_order_id: &str, status: RemoteStatus) {
        self.script.lock().unwrap().remote_statuses.insert(gateway_order_id.to_string(), status);
    }

    pub fn checkout_calls(&self) -> u32 {
        self.script.lock().unwrap().checkout_calls
    }

    pub fn status_calls(&self) -> u32 {
        self.script.lock().unwrap().status_calls
    }

    pub fn refund_calls(&self) -> u32 {
        self.script.lock().unwrap().refund_calls
    }

    pub fn last_refund(&self) -> Option<RecordedRefund> {
        self.script.lock().unwrap().last_refund.clone()
    }
}

impl GatewayClient for ScriptedGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayClientError> {
        let mut script = self.script.lock().unwrap();
        script.checkout_calls += 1;
        if let Some(error) = &script.checkout_error {
            return Err(error.clone());
        }
        let gateway_order_id = format!("gw-{}", request.order.order_id.as_str());
        let payment_url = format!("https://gateway.test/pay/{gateway_order_id}");
        Ok(CheckoutSession { gateway_order_id, payment_url })
    }

    async fn fetch_remote_status(&self, gateway_order_id: &str) -> Result<RemoteStatus, GatewayClientError> {
        let mut script = self.script.lock().unwrap();
        script.status_calls += 1;
        if let Some(error) = &script.status_error {
            return Err(error.clone());
        }
        script
            .remote_statuses
            .get(gateway_order_id)
            .cloned()
            .ok_or_else(|| GatewayClientError::Rejected { status: 404, message: "order not found".to_string() })
    }

    async fn refund(
        &self,
        gateway_order_id: &str,
        order_id: &OrderId,
        amount: Option<Gel>,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayClientError> {
        let mut script = self.script.lock().unwrap();
        script.refund_calls += 1;
        script.last_refund = Some(RecordedRefund {
            gateway_order_id: gateway_order_id.to_string(),
            order_id: order_id.clone(),
            amount,
            idempotency_key: idempotency_key.to_string(),
        });
        if let Some(error) = &script.refund_error {
            return Err(error.clone());
        }
        Ok(RefundReceipt {
            action_id: Some(format!("act-{}", script.refund_calls)),
            raw: serde_json::json!({"result": "accepted"}),
        })
    }
}
