use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spg_common::{helpers::is_valid_georgian_mobile, Gel};
use storefront_payment_engine::{
    db_types::{LineItem, MapPoint, NewOrder, Order, OrderId, OrderStatusType},
    OrderQueryFilter,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------

/// An incoming storefront order. All amounts are decimal GEL on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub order_id: String,
    pub customer: CustomerRequest,
    pub address: AddressRequest,
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Where the order goes. At least one of `text` and `location` must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub location: Option<MapPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub size_kg: Option<f64>,
    pub quantity: u32,
    pub unit_price: f64,
}

impl NewOrderRequest {
    pub fn try_into_new_order(self) -> Result<NewOrder, String> {
        if self.order_id.trim().is_empty() {
            return Err("order_id must not be empty".to_string());
        }
        if self.customer.first_name.trim().is_empty() || self.customer.last_name.trim().is_empty() {
            return Err("customer first and last name must not be empty".to_string());
        }
        if !is_valid_georgian_mobile(&self.customer.phone) {
            return Err(format!("'{}' is not a valid Georgian mobile number", self.customer.phone));
        }
        let has_text = self.address.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !has_text && self.address.location.is_none() {
            return Err("either an address text or a map location is required".to_string());
        }
        if self.items.is_empty() {
            return Err("the order has no items".to_string());
        }
        let items = self
            .items
            .into_iter()
            .map(|item| {
                let unit_price =
                    Gel::try_from(item.unit_price).map_err(|e| format!("invalid price for {}: {e}", item.product_id))?;
                Ok(LineItem {
                    product_id: item.product_id,
                    name: item.name,
                    size_kg: item.size_kg,
                    quantity: item.quantity,
                    unit_price,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        let mut order = NewOrder::new(
            OrderId(self.order_id),
            self.customer.first_name,
            self.customer.last_name,
            self.customer.phone,
            items,
        );
        if has_text {
            order = order.with_delivery_address(self.address.text.unwrap_or_default());
        }
        if let Some(location) = self.address.location {
            order = order.with_location(location);
        }
        Ok(order)
    }
}

/// The customer-facing view of an order. Deliberately smaller than [`Order`]; internal bookkeeping stays internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub total_price: Gel,
    pub payment_url: Option<String>,
}

impl From<Order> for OrderStatusResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            status: order.status,
            total_price: order.total_price,
            payment_url: order.payment_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatusType,
}

/// Admin order search parameters. `status` takes a comma-separated list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchOrdersParams {
    pub order_id: Option<String>,
    pub customer_phone: Option<String>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub with_gateway_session: bool,
}

impl SearchOrdersParams {
    pub fn try_into_filter(self) -> Result<OrderQueryFilter, String> {
        let mut filter = OrderQueryFilter::default();
        if let Some(order_id) = self.order_id {
            filter = filter.with_order_id(OrderId(order_id));
        }
        if let Some(phone) = self.customer_phone {
            filter = filter.with_customer_phone(phone);
        }
        if let Some(statuses) = self.status {
            for status in statuses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let status =
                    status.parse::<OrderStatusType>().map_err(|_| format!("'{status}' is not a valid order status"))?;
                filter = filter.with_status(status);
            }
        }
        if let Some(since) = self.since {
            filter = filter.since(since);
        }
        if let Some(until) = self.until {
            filter = filter.until(until);
        }
        if self.with_gateway_session {
            filter = filter.with_gateway_session();
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaymentsQuery {
    pub limit: Option<i64>,
}

//----------------------------------------------   Refunds  ----------------------------------------------------

/// An admin refund request. `amount` is decimal GEL; omit it for a full refund of the remaining amount.
/// Refunds move money, so the caller re-supplies the admin password with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub order_id: String,
    pub amount: Option<f64>,
    pub admin_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub amount: Gel,
    /// True when the gateway could not process the refund and an operator must settle it by hand.
    pub manual_mode: bool,
    pub new_status: OrderStatusType,
    pub action_id: Option<String>,
    pub message: String,
}

//----------------------------------------------   Auth  ----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserRequest {
    pub username: String,
    pub password: String,
}
