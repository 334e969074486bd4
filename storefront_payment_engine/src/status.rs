//! Gateway status normalisation.
//!
//! The gateway reports order state as free-ish text that differs across API generations ("success", "performed",
//! "Captured", "დასრულებული"...). Everything the engine does downstream works on [`OrderStatusType`], so the raw
//! text is classified exactly once, here, by keyword.
//!
//! Refunds need a second input: the gateway reuses a single "refunded" status for full and partial refunds and only
//! the `actions` array tells them apart. [`resolve`] therefore takes the order total and the parsed refund actions
//! and works out which member of the refund family applies.
use log::*;
use serde_json::Value;
use spg_common::Gel;

use crate::db_types::{OrderId, OrderStatusType, PaymentStatus};

/// A canonical, gateway-agnostic payment notification, as handed to
/// [`PaymentFlowApi::process_payment_update`](crate::PaymentFlowApi::process_payment_update). The server's gateway
/// integration converts verified webhook payloads and sync query results into this shape.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub order_id: OrderId,
    pub gateway_order_id: Option<String>,
    pub transaction_id: Option<String>,
    /// The captured amount, when the notification carries one.
    pub amount: Option<Gel>,
    /// The raw gateway status text.
    pub status_text: String,
    pub payment_method: Option<String>,
    pub refund_actions: Vec<RefundAction>,
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundActionKind {
    /// The money has been returned.
    Settled,
    /// A refund has been requested at the gateway but has not settled yet.
    Requested,
}

#[derive(Debug, Clone, Copy)]
pub struct RefundAction {
    pub kind: RefundActionKind,
    pub amount: Gel,
}

/// The outcome of classifying one notification against the order it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct StatusResolution {
    pub order_status: OrderStatusType,
    pub payment_status: PaymentStatus,
    /// The total settled refund amount implied by the notification, when it describes a refund.
    pub settled_refund: Option<Gel>,
}

const SUCCESS_KEYWORDS: [&str; 8] = ["success", "performed", "completed", "captured", "paid", "approved", "finished", "ok"];
const FAILURE_KEYWORDS: [&str; 8] = ["fail", "reject", "error", "cancel", "declin", "revers", "timeout", "expir"];

/// Classify a notification. Returns `None` when the status text matches no known family; such notifications are
/// recorded in the payment audit trail but must not move the order.
pub fn resolve(update: &PaymentUpdate, order_total: Gel) -> Option<StatusResolution> {
    let text = update.status_text.to_lowercase();
    // Refunds are checked first. Texts such as "refund_rejected" refer to the refund, not the payment, and must not
    // be classified as failures of the original capture.
    if text.contains("refund") {
        let (order_status, settled) = refund_outcome(&update.refund_actions, order_total);
        return Some(StatusResolution {
            order_status,
            payment_status: PaymentStatus::Refunded,
            settled_refund: Some(settled),
        });
    }
    if SUCCESS_KEYWORDS.iter().any(|k| text.contains(k)) {
        return Some(StatusResolution {
            order_status: OrderStatusType::Paid,
            payment_status: PaymentStatus::Succeeded,
            settled_refund: None,
        });
    }
    if FAILURE_KEYWORDS.iter().any(|k| text.contains(k)) {
        return Some(StatusResolution {
            order_status: OrderStatusType::Failed,
            payment_status: PaymentStatus::Failed,
            settled_refund: None,
        });
    }
    debug!("🧮️ Unrecognised gateway status '{}' for order {}", update.status_text, update.order_id);
    None
}

/// Decide which member of the refund family a refund notification lands on.
///
/// Settled amounts win over requested ones. A refund notification with no action amounts at all is taken as a full
/// settled refund, matching what older gateway generations send.
pub fn refund_outcome(actions: &[RefundAction], order_total: Gel) -> (OrderStatusType, Gel) {
    let settled: Gel =
        actions.iter().filter(|a| a.kind == RefundActionKind::Settled).map(|a| a.amount).sum();
    let requested: Gel =
        actions.iter().filter(|a| a.kind == RefundActionKind::Requested).map(|a| a.amount).sum();
    if settled >= order_total && order_total.is_positive() {
        return (OrderStatusType::Refunded, settled);
    }
    if settled.is_positive() {
        return (OrderStatusType::RefundedPartially, settled);
    }
    if requested.is_positive() {
        let status = if requested >= order_total {
            OrderStatusType::RefundPending
        } else {
            OrderStatusType::RefundPendingPartial
        };
        return (status, Gel::default());
    }
    (OrderStatusType::Refunded, order_total)
}

/// Map a gateway action-type label onto a refund action, if it is one. Non-refund actions (authorize, capture...)
/// are ignored.
pub fn classify_action(action_type: &str, amount: Gel) -> Option<RefundAction> {
    let label = action_type.to_lowercase();
    if !label.contains("refund") && !label.contains("return") {
        return None;
    }
    let kind = if label.contains("request") || label.contains("pending") {
        RefundActionKind::Requested
    } else {
        RefundActionKind::Settled
    };
    Some(RefundAction { kind, amount })
}
