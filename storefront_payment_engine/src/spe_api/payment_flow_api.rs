use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use serde::Serialize;
use spg_common::Gel;

use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment, PaymentStatus, RefundDetail},
    events::{EventProducers, ManualRefundEvent, OrderPaidEvent},
    spe_api::{
        errors::PaymentFlowError,
        order_objects::{OrderQueryFilter, SyncReport},
    },
    status::{self, PaymentUpdate, RefundAction, StatusResolution},
    traits::{CheckoutRequest, GatewayClient, InsertOrderResult, InsertPaymentResult, PaymentGatewayDatabase},
};

/// Refunds are only accepted while the order is younger than this. The window is anchored on the order's
/// `created_at`, not on any payment record.
pub const REFUND_WINDOW_DAYS: i64 = 7;

/// `PaymentFlowApi` is the primary API for the payment engine. It owns the order lifecycle rules and coordinates
/// the database, the payment gateway and the event hooks.
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSummary {
    pub order: Order,
    pub gateway_order_id: String,
    /// The gateway-hosted payment page the customer should be redirected to.
    pub payment_url: String,
}

#[derive(Debug, Clone)]
pub struct RefundResult {
    pub order: Order,
    /// The amount this refund round asked for.
    pub amount: Gel,
    /// `true` when the gateway could not process the refund and it has been queued for manual settlement.
    pub manual_mode: bool,
    pub action_id: Option<String>,
}

impl<B, G> PaymentFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: PaymentGatewayDatabase,
    G: GatewayClient,
{
    /// Accept a new storefront order and open a checkout session for it at the gateway.
    ///
    /// The order row is written first, in `pending`, so that a gateway outage never loses the order itself. If the
    /// checkout call fails the error is returned and the order stays pending; the storefront may retry by
    /// resubmitting under a fresh order id.
    pub async fn initiate_order(&self, order: NewOrder) -> Result<CheckoutSummary, PaymentFlowError> {
        if order.items.is_empty() {
            return Err(PaymentFlowError::InvalidOrder(order.order_id, "order has no items".to_string()));
        }
        if !order.total_price.is_positive() {
            return Err(PaymentFlowError::InvalidOrder(order.order_id, "order total must be positive".to_string()));
        }
        if !order.total_is_consistent() {
            return Err(PaymentFlowError::InvalidOrder(
                order.order_id,
                "order total does not match the line items".to_string(),
            ));
        }
        match self.db.insert_order(order.clone()).await.map_err(PaymentFlowError::db)? {
            InsertOrderResult::Inserted(id) => {
                debug!("🔄️📦️ Order {} saved with row id {id}", order.order_id);
            },
            InsertOrderResult::AlreadyExists(_) => {
                return Err(PaymentFlowError::OrderAlreadyExists(order.order_id));
            },
        }
        let order_id = order.order_id.clone();
        let session = self.gateway.create_checkout(&CheckoutRequest { order }).await?;
        self.db
            .attach_gateway_session(&order_id, &session.gateway_order_id, &session.payment_url)
            .await
            .map_err(PaymentFlowError::db)?;
        let order = self.fetch_order(&order_id).await?;
        info!("🔄️📦️ Order {order_id} is awaiting payment at the gateway ({})", session.gateway_order_id);
        Ok(CheckoutSummary { order, gateway_order_id: session.gateway_order_id, payment_url: session.payment_url })
    }

    /// Process one verified payment notification.
    ///
    /// Every notification is recorded in the payment audit trail, replays and unrecognised statuses included. The
    /// order only moves when the normalised status is a transition the lifecycle rules allow; the updated order is
    /// returned in that case.
    pub async fn process_payment_update(&self, update: PaymentUpdate) -> Result<Option<Order>, PaymentFlowError> {
        let order = self.find_order_for_update(&update).await?;
        let resolution = status::resolve(&update, order.total_price);
        let payment = NewPayment {
            order_id: order.order_id.clone(),
            gateway_order_id: update.gateway_order_id.clone(),
            transaction_id: update.transaction_id.clone(),
            amount: update.amount.unwrap_or(order.total_price),
            status: resolution.map(|r| r.payment_status).unwrap_or(PaymentStatus::Pending),
            payment_method: update.payment_method.clone(),
            raw_payload: update.raw.clone(),
        };
        match self.db.insert_payment(payment).await.map_err(PaymentFlowError::db)? {
            InsertPaymentResult::Inserted(id) => {
                trace!("🔄️💰️ Notification for order {} recorded with id {id}", order.order_id);
            },
            InsertPaymentResult::AlreadyExists(id) => {
                debug!("🔄️💰️ Notification for order {} is a replay of payment record {id}", order.order_id);
            },
        }
        let Some(resolution) = resolution else {
            info!(
                "🔄️💰️ Gateway status '{}' for order {} is not recognised. Recorded without changing the order.",
                update.status_text, order.order_id
            );
            return Ok(None);
        };
        self.apply_resolution(order, resolution).await
    }

    async fn find_order_for_update(&self, update: &PaymentUpdate) -> Result<Order, PaymentFlowError> {
        if let Some(order) = self.db.fetch_order_by_id(&update.order_id).await.map_err(PaymentFlowError::db)? {
            return Ok(order);
        }
        if let Some(gateway_id) = &update.gateway_order_id {
            if let Some(order) =
                self.db.fetch_order_by_gateway_id(gateway_id).await.map_err(PaymentFlowError::db)?
            {
                debug!("🔄️💰️ Notification matched order {} by its gateway id {gateway_id}", order.order_id);
                return Ok(order);
            }
        }
        Err(PaymentFlowError::OrderNotFound(update.order_id.clone()))
    }

    /// Apply a classified status to the order: update refund bookkeeping, run the transition guard, and fire the
    /// paid hook when the order first becomes paid.
    async fn apply_resolution(
        &self,
        order: Order,
        resolution: StatusResolution,
    ) -> Result<Option<Order>, PaymentFlowError> {
        if let Some(settled) = resolution.settled_refund {
            if settled.is_positive() {
                let mut detail = order.refund_detail.clone().unwrap_or_default();
                // The settled figure from the gateway is authoritative and cumulative across refund rounds.
                if settled > detail.refunded_amount {
                    detail.refunded_amount = settled;
                }
                detail.requested_amount = None;
                detail.processed_at = Utc::now();
                self.db.set_refund_detail(&order.order_id, &detail).await.map_err(PaymentFlowError::db)?;
            }
        }
        if !order.status.can_transition_to(resolution.order_status) {
            debug!(
                "🔄️💰️ Order {} stays '{}'. A move to '{}' is not permitted.",
                order.order_id, order.status, resolution.order_status
            );
            return Ok(None);
        }
        let updated =
            self.db.update_order_status(&order.order_id, resolution.order_status).await.map_err(PaymentFlowError::db)?;
        info!("🔄️💰️ Order {} moved from '{}' to '{}'", updated.order_id, order.status, updated.status);
        if updated.status == OrderStatusType::Paid
            && self.db.acquire_notification_slot(&updated.order_id).await.map_err(PaymentFlowError::db)?
        {
            self.call_order_paid_hook(&updated).await;
        }
        Ok(Some(updated))
    }

    /// Refund an order, fully (`amount = None`) or partially.
    ///
    /// Preconditions are checked in a fixed order so the caller always gets the most specific error: existence,
    /// refundable status, refund window, then amount. When the gateway accepts the refund the order settles
    /// immediately into `refunded` or `refunded_partially` and the cumulative refunded amount is recorded.
    ///
    /// When the gateway is unreachable or exposes no refund endpoint the refund is queued for manual settlement
    /// instead of failing: the order moves to `refund_pending` or `refund_pending_partial`, the bookkeeping is
    /// flagged `manual_mode`, and the manual-refund hook fires so an operator is told. Settlement then comes from
    /// a webhook, a sync pass, or a retry of this call once the gateway recovers.
    pub async fn refund(
        &self,
        order_id: &OrderId,
        amount: Option<Gel>,
        refunded_by: &str,
    ) -> Result<RefundResult, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        if !order.status.is_refundable() {
            return Err(PaymentFlowError::OrderNotRefundable { order_id: order_id.clone(), status: order.status });
        }
        let age = Utc::now() - order.created_at;
        if age > Duration::days(REFUND_WINDOW_DAYS) {
            let days_late = age.num_days() - REFUND_WINDOW_DAYS;
            return Err(PaymentFlowError::RefundWindowExpired { order_id: order_id.clone(), days_late });
        }
        let remaining = order.refundable_amount();
        let requested = amount.unwrap_or(remaining);
        if !requested.is_positive() {
            return Err(PaymentFlowError::InvalidRefundAmount("refund amount must be positive".to_string()));
        }
        if requested > remaining {
            return Err(PaymentFlowError::InvalidRefundAmount(format!(
                "{requested} exceeds the refundable {remaining}"
            )));
        }
        let already_refunded = order.refund_detail.as_ref().map(|d| d.refunded_amount).unwrap_or_default();
        // Stable across retries of the same logical refund. A second round (after a partial settlement) changes
        // the already-refunded component and so gets a fresh key.
        let idempotency_key =
            format!("refund-{}-{}-{}", order.order_id.as_str(), requested.value(), already_refunded.value());
        let outcome = match &order.gateway_order_id {
            Some(gateway_id) => {
                match self.gateway.refund(gateway_id, &order.order_id, amount, &idempotency_key).await {
                    Ok(receipt) => (false, receipt.action_id),
                    Err(e) if e.warrants_manual_refund() => {
                        warn!(
                            "🔄️↩️ Gateway refund for order {} failed ({e}). Queueing for manual settlement.",
                            order.order_id
                        );
                        (true, None)
                    },
                    Err(e) => return Err(e.into()),
                }
            },
            None => {
                warn!(
                    "🔄️↩️ Order {} has no gateway session. Its refund can only be settled manually.",
                    order.order_id
                );
                (true, None)
            },
        };
        let (manual_mode, action_id) = outcome;
        let mut detail = order.refund_detail.clone().unwrap_or_default();
        detail.manual_mode = manual_mode;
        detail.action_id = action_id.clone();
        detail.refunded_by = Some(refunded_by.to_string());
        detail.processed_at = Utc::now();
        let new_status = if manual_mode {
            detail.requested_amount = Some(requested);
            if requested == order.total_price {
                OrderStatusType::RefundPending
            } else {
                OrderStatusType::RefundPendingPartial
            }
        } else {
            detail.refunded_amount = already_refunded + requested;
            detail.requested_amount = None;
            if detail.refunded_amount == order.total_price {
                OrderStatusType::Refunded
            } else {
                OrderStatusType::RefundedPartially
            }
        };
        self.db.set_refund_detail(&order.order_id, &detail).await.map_err(PaymentFlowError::db)?;
        let updated =
            self.db.update_order_status(&order.order_id, new_status).await.map_err(PaymentFlowError::db)?;
        info!(
            "🔄️↩️ Refund of {requested} for order {} {}. Order is now '{}'.",
            updated.order_id,
            if manual_mode { "queued for manual settlement" } else { "accepted and settled" },
            updated.status
        );
        if manual_mode {
            self.call_manual_refund_hook(ManualRefundEvent::new(updated.clone(), requested)).await;
        }
        Ok(RefundResult { order: updated, amount: requested, manual_mode, action_id })
    }

    /// Admin-driven fulfilment progress. Only the kitchen statuses can be set this way; payment and refund
    /// statuses are owned by the gateway flows.
    pub async fn advance_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        let is_fulfilment =
            matches!(new_status, OrderStatusType::Preparing | OrderStatusType::Sent | OrderStatusType::Completed);
        if !is_fulfilment || !order.status.can_transition_to(new_status) {
            return Err(PaymentFlowError::InvalidStatusChange {
                order_id: order_id.clone(),
                from: order.status,
                to: new_status,
            });
        }
        let updated = self.db.update_order_status(order_id, new_status).await.map_err(PaymentFlowError::db)?;
        info!("🔄️📦️ Order {order_id} advanced from '{}' to '{}'", order.status, updated.status);
        Ok(updated)
    }

    /// Reconcile recent orders against the gateway.
    ///
    /// Queries the gateway for every order that could still move: `pending` and the refund-pending statuses are
    /// waiting on the gateway, while `paid` and `failed` are re-checked because a late reversal or a retried
    /// payment can still change them. The same normalisation and transition rules as the webhook path apply, so
    /// lost webhooks are repaired here.
    pub async fn sync_orders(&self) -> Result<SyncReport, PaymentFlowError> {
        let filter = OrderQueryFilter::default()
            .with_status(OrderStatusType::Pending)
            .with_status(OrderStatusType::Paid)
            .with_status(OrderStatusType::Failed)
            .with_status(OrderStatusType::RefundPending)
            .with_status(OrderStatusType::RefundPendingPartial)
            .with_gateway_session();
        let orders = self.db.search_orders(filter).await.map_err(PaymentFlowError::db)?;
        let mut report = SyncReport::default();
        info!("🔁️ Reconciling {} unsettled order(s) against the gateway", orders.len());
        for order in orders {
            report.examined += 1;
            let Some(gateway_id) = order.gateway_order_id.clone() else {
                report.unchanged += 1;
                continue;
            };
            let remote = match self.gateway.fetch_remote_status(&gateway_id).await {
                Ok(remote) => remote,
                Err(e) => {
                    warn!("🔁️ Could not query the gateway for order {}: {e}", order.order_id);
                    report.failures.push((order.order_id.clone(), e.to_string()));
                    continue;
                },
            };
            let update = PaymentUpdate {
                order_id: order.order_id.clone(),
                gateway_order_id: Some(gateway_id),
                transaction_id: None,
                amount: None,
                status_text: remote.status_text,
                payment_method: None,
                refund_actions: refund_actions_from_payload(&remote.raw),
                raw: remote.raw,
            };
            match self.process_payment_update(update).await? {
                Some(_) => report.updated += 1,
                None => report.unchanged += 1,
            }
        }
        info!(
            "🔁️ Reconciliation complete. {} examined, {} updated, {} unchanged, {} failed.",
            report.examined,
            report.updated,
            report.unchanged,
            report.failures.len()
        );
        Ok(report)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentFlowError> {
        self.db
            .fetch_order_by_id(order_id)
            .await
            .map_err(PaymentFlowError::db)?
            .ok_or_else(|| PaymentFlowError::OrderNotFound(order_id.clone()))
    }

    pub async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, PaymentFlowError> {
        self.db.search_orders(filter).await.map_err(PaymentFlowError::db)
    }

    pub async fn payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentFlowError> {
        self.db.fetch_payments_for_order(order_id).await.map_err(PaymentFlowError::db)
    }

    pub async fn fetch_payments(&self, limit: i64) -> Result<Vec<Payment>, PaymentFlowError> {
        self.db.fetch_payments(limit).await.map_err(PaymentFlowError::db)
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️📦️ Notifying order-paid hook subscribers for order {}", order.order_id);
            emitter.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    async fn call_manual_refund_hook(&self, event: ManualRefundEvent) {
        for emitter in &self.producers.manual_refund_producer {
            debug!("🔄️↩️ Notifying manual-refund hook subscribers for order {}", event.order.order_id);
            emitter.publish_event(event.clone()).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

/// Pull refund actions out of a raw gateway order document, for the sync path where no webhook parser has run.
fn refund_actions_from_payload(payload: &serde_json::Value) -> Vec<RefundAction> {
    let Some(actions) = payload.get("actions").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    actions
        .iter()
        .filter_map(|action| {
            let action_type = action.get("action_type").or_else(|| action.get("type"))?.as_str()?;
            let amount = action.get("amount").and_then(|v| {
                v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()))
            })?;
            status::classify_action(action_type, Gel::try_from(amount).ok()?)
        })
        .collect()
}
