use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spg_common::{Gel, GEL_CURRENCY_CODE};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------        OrderId        -------------------------------------------------------
/// The storefront-assigned order identifier. This is the id the gateway echoes back as `external_order_id` in
/// payment notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// The full order lifecycle. Statuses are stored as snake_case text in the database and rendered the same way in
/// API responses.
///
/// The payment-facing half (`Pending` through the refund family) is driven by gateway notifications and the refund
/// flow. The fulfilment half (`Preparing`, `Sent`, `Completed`) is driven by admins moving a paid order through the
/// kitchen. Transitions are guarded by [`OrderStatusType::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order exists but no conclusive payment notification has arrived.
    Pending,
    /// Payment has been captured in full.
    Paid,
    /// The payment was rejected, cancelled or timed out at the gateway.
    Failed,
    /// The full captured amount has been returned to the customer.
    Refunded,
    /// Part of the captured amount has been returned to the customer.
    RefundedPartially,
    /// A full refund has been accepted by the gateway (or queued for manual processing) but not yet settled.
    RefundPending,
    /// A partial refund has been accepted by the gateway (or queued for manual processing) but not yet settled.
    RefundPendingPartial,
    /// The kitchen is working on the order.
    Preparing,
    /// The order has left for delivery.
    Sent,
    /// The order has been delivered.
    Completed,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::RefundedPartially => "refunded_partially",
            Self::RefundPending => "refund_pending",
            Self::RefundPendingPartial => "refund_pending_partial",
            Self::Preparing => "preparing",
            Self::Sent => "sent",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "refunded_partially" => Ok(Self::RefundedPartially),
            "refund_pending" => Ok(Self::RefundPending),
            "refund_pending_partial" => Ok(Self::RefundPendingPartial),
            "preparing" => Ok(Self::Preparing),
            "sent" => Ok(Self::Sent),
            "completed" => Ok(Self::Completed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

impl OrderStatusType {
    /// Paid and the fulfilment statuses that follow it. Money has been captured and not (fully) returned.
    pub fn is_paid_family(&self) -> bool {
        matches!(self, Self::Paid | Self::Preparing | Self::Sent | Self::Completed)
    }

    pub fn is_refund_family(&self) -> bool {
        matches!(
            self,
            Self::Refunded | Self::RefundedPartially | Self::RefundPending | Self::RefundPendingPartial
        )
    }

    /// Whether an admin may still initiate a refund from this status. A partially refunded order can be refunded
    /// again for the remainder, and a refund that is still pending (the manual queue) can be retried.
    pub fn is_refundable(&self) -> bool {
        self.is_paid_family()
            || matches!(self, Self::RefundedPartially | Self::RefundPending | Self::RefundPendingPartial)
    }

    /// The transition guard applied to every status write, whether it originates from a webhook, a sync pass, the
    /// refund flow or an admin.
    ///
    /// The rules encode two protections:
    /// * A late or replayed "paid" notification never regresses an order that has advanced into fulfilment.
    /// * Settled refunds are terminal with the single exception of topping up a partial refund.
    pub fn can_transition_to(&self, new: Self) -> bool {
        use OrderStatusType::*;
        if *self == new {
            return false;
        }
        match (*self, new) {
            (Pending, Paid | Failed) => true,
            // A gateway retry can succeed after an earlier attempt failed.
            (Failed, Paid) => true,
            (Paid, Preparing | Sent | Completed) => true,
            (Preparing, Sent | Completed) => true,
            (Sent, Completed) => true,
            (s, n) if s.is_paid_family() && n.is_refund_family() => true,
            (RefundPending, Refunded | RefundedPartially) => true,
            (RefundPendingPartial, Refunded | RefundedPartially) => true,
            (RefundedPartially, Refunded | RefundPending | RefundPendingPartial) => true,
            _ => false,
        }
    }
}

//--------------------------------------      LineItem         -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    /// Portion weight for products sold by weight. Informational; prices are always per unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_kg: Option<f64>,
    pub quantity: u32,
    pub unit_price: Gel,
}

impl LineItem {
    pub fn line_total(&self) -> Gel {
        self.unit_price * i64::from(self.quantity)
    }
}

//--------------------------------------      MapPoint          ------------------------------------------------------
/// A delivery location picked on the storefront map. Orders need either this or an address text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lng: f64,
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub first_name: String,
    pub last_name: String,
    pub customer_phone: String,
    pub delivery_address: Option<String>,
    pub location: Option<MapPoint>,
    pub items: Vec<LineItem>,
    pub total_price: Gel,
    pub currency: String,
    pub status: OrderStatusType,
    /// The gateway-side id of the checkout session, once one has been created.
    pub gateway_order_id: Option<String>,
    /// The gateway-hosted payment page the customer was sent to.
    pub payment_url: Option<String>,
    /// Whether the paid notification for this order has been dispatched. Written with a compare-and-set so that
    /// concurrent webhook deliveries produce at most one notification.
    pub notification_sent: bool,
    pub refund_detail: Option<RefundDetail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The amount still held by the merchant, net of settled refunds.
    pub fn refundable_amount(&self) -> Gel {
        let refunded = self.refund_detail.as_ref().map(|d| d.refunded_amount).unwrap_or_default();
        self.total_price - refunded
    }

    pub fn customer_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub first_name: String,
    pub last_name: String,
    pub customer_phone: String,
    pub delivery_address: Option<String>,
    pub location: Option<MapPoint>,
    pub items: Vec<LineItem>,
    pub total_price: Gel,
    pub currency: String,
}

impl NewOrder {
    pub fn new(
        order_id: OrderId,
        first_name: String,
        last_name: String,
        customer_phone: String,
        items: Vec<LineItem>,
    ) -> Self {
        let total_price = items.iter().map(LineItem::line_total).sum();
        Self {
            order_id,
            first_name,
            last_name,
            customer_phone,
            delivery_address: None,
            location: None,
            items,
            total_price,
            currency: GEL_CURRENCY_CODE.to_string(),
        }
    }

    pub fn with_delivery_address(mut self, address: String) -> Self {
        self.delivery_address = Some(address);
        self
    }

    pub fn with_location(mut self, location: MapPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Whether the stated total matches the sum of the line items.
    pub fn total_is_consistent(&self) -> bool {
        self.items.iter().map(LineItem::line_total).sum::<Gel>() == self.total_price
    }
}

//--------------------------------------     RefundDetail      -------------------------------------------------------
/// The refund bookkeeping attached to an order. Stored as a JSON document on the order row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDetail {
    /// Total settled refund amount across all refund rounds.
    pub refunded_amount: Gel,
    /// The amount of the most recent refund request that has not yet settled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_amount: Option<Gel>,
    /// Set when the gateway could not process the refund and it was queued for manual processing by an operator.
    pub manual_mode: bool,
    /// The gateway's identifier for the refund action, when it supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    /// The admin username that initiated the most recent refund round.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_by: Option<String>,
    pub processed_at: DateTime<Utc>,
}

//--------------------------------------      Payment          -------------------------------------------------------
/// One payment notification as recorded in the audit trail. Every accepted webhook and every gateway sync result
/// lands here, even when it does not change the order status.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: OrderId,
    pub gateway_order_id: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Gel,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    /// The raw notification payload, verbatim.
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub gateway_order_id: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Gel,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub raw_payload: serde_json::Value,
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------      AdminUser        -------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    /// `salt:hex(hmac_sha256(salt, password))`
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for s in [
            OrderStatusType::Pending,
            OrderStatusType::RefundPendingPartial,
            OrderStatusType::RefundedPartially,
            OrderStatusType::Completed,
        ] {
            assert_eq!(s.to_string().parse::<OrderStatusType>().unwrap(), s);
        }
        assert!("shipped".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn late_paid_does_not_regress_fulfilment() {
        assert!(OrderStatusType::Pending.can_transition_to(OrderStatusType::Paid));
        assert!(!OrderStatusType::Preparing.can_transition_to(OrderStatusType::Paid));
        assert!(!OrderStatusType::Completed.can_transition_to(OrderStatusType::Paid));
        assert!(OrderStatusType::Completed.can_transition_to(OrderStatusType::RefundPending));
    }

    #[test]
    fn settled_refunds_are_terminal_except_partial_top_up() {
        assert!(!OrderStatusType::Refunded.can_transition_to(OrderStatusType::Paid));
        assert!(!OrderStatusType::Refunded.can_transition_to(OrderStatusType::RefundPending));
        assert!(OrderStatusType::RefundedPartially.can_transition_to(OrderStatusType::RefundPendingPartial));
        assert!(OrderStatusType::RefundedPartially.can_transition_to(OrderStatusType::Refunded));
    }

    #[test]
    fn pending_refunds_can_be_retried() {
        assert!(OrderStatusType::RefundPending.is_refundable());
        assert!(OrderStatusType::RefundPendingPartial.is_refundable());
        assert!(OrderStatusType::RefundedPartially.is_refundable());
        assert!(!OrderStatusType::Refunded.is_refundable());
        assert!(!OrderStatusType::Pending.is_refundable());
    }

    #[test]
    fn new_order_totals() {
        let items = vec![
            LineItem {
                product_id: "khc-1".into(),
                name: "Khachapuri".into(),
                size_kg: None,
                quantity: 2,
                unit_price: Gel::from_gel(12),
            },
            LineItem {
                product_id: "lmn-1".into(),
                name: "Lemonade".into(),
                size_kg: None,
                quantity: 1,
                unit_price: Gel::from_tetri(450),
            },
        ];
        let order =
            NewOrder::new(OrderId("ord-1".into()), "Nino".into(), "Beridze".into(), "+995555123456".into(), items);
        assert_eq!(order.total_price, Gel::from_tetri(2850));
        assert!(order.total_is_consistent());
    }
}
