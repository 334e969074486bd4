//! The iPay gateway integration.
//!
//! [`IpayGateway`] adapts the low-level [`IpayApi`] client to the engine's [`GatewayClient`] contract, and
//! [`payment_update_from_notice`] converts a verified webhook payload into the engine's canonical
//! [`PaymentUpdate`]. Everything iPay-specific stops here; the engine only ever sees normalised shapes.

use std::sync::Arc;

use ipay_tools::{
    BasketItem, Buyer, CreateOrderRequest, IpayApi, IpayApiError, IpayConfig, Merchant, PaymentNotice, PurchaseUnits,
    RedirectUrls, RequestOptions,
};
use log::*;
use serde_json::Value;
use spg_common::Gel;
use storefront_payment_engine::{
    db_types::OrderId,
    status::{self, PaymentUpdate},
    traits::{CheckoutRequest, CheckoutSession, GatewayClientError, RefundReceipt, RemoteStatus},
    GatewayClient,
};

use crate::errors::ServerError;

#[derive(Clone)]
pub struct IpayGateway {
    api: Arc<IpayApi>,
}

impl IpayGateway {
    pub fn new(config: IpayConfig) -> Result<Self, ServerError> {
        let api = IpayApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api: Arc::new(api) })
    }

    fn checkout_payload(&self, request: &CheckoutRequest) -> CreateOrderRequest {
        let order = &request.order;
        let config = self.api.config();
        let basket = order
            .items
            .iter()
            .map(|item| BasketItem {
                product_id: item.product_id.clone(),
                description: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price.to_decimal(),
            })
            .collect();
        let merchant = if config.merchant_id.is_some() || config.terminal_id.is_some() {
            Some(Merchant {
                id: config.merchant_id.clone(),
                terminal_id: config.terminal_id.clone(),
                name: config.merchant_name.clone(),
                inn: config.merchant_inn.clone(),
            })
        } else {
            None
        };
        CreateOrderRequest {
            callback_url: config.callback_url.clone(),
            external_order_id: order.order_id.as_str().to_string(),
            purchase_units: PurchaseUnits {
                currency: order.currency.clone(),
                total_amount: order.total_price.to_decimal(),
                basket,
            },
            redirect_urls: RedirectUrls { success: config.return_url.clone(), fail: config.return_url.clone() },
            buyer: Buyer {
                full_name: format!("{} {}", order.first_name, order.last_name),
                phone_number: order.customer_phone.clone(),
            },
            merchant,
        }
    }
}

impl GatewayClient for IpayGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayClientError> {
        if !self.api.config().has_credentials() {
            return Err(GatewayClientError::NotConfigured);
        }
        let payload = self.checkout_payload(request);
        let opts = RequestOptions::with_idempotency_key(format!("order-{}", request.order.order_id.as_str()));
        let response = self.api.create_order(&payload, &opts).await.map_err(gateway_error)?;
        let gateway_order_id = response
            .gateway_order_id()
            .ok_or_else(|| GatewayClientError::InvalidResponse("checkout response carries no order id".to_string()))?;
        let payment_url = response
            .redirect_url()
            .ok_or_else(|| {
                GatewayClientError::InvalidResponse("checkout response carries no payment page URL".to_string())
            })?
            .to_string();
        Ok(CheckoutSession { gateway_order_id, payment_url })
    }

    async fn fetch_remote_status(&self, gateway_order_id: &str) -> Result<RemoteStatus, GatewayClientError> {
        if !self.api.config().has_credentials() {
            return Err(GatewayClientError::NotConfigured);
        }
        let raw = self.api.get_order(gateway_order_id).await.map_err(gateway_error)?;
        let status_text = ipay_tools::status_text(&raw).ok_or_else(|| {
            GatewayClientError::InvalidResponse(format!("order document for {gateway_order_id} carries no status"))
        })?;
        Ok(RemoteStatus { status_text, raw })
    }

    async fn refund(
        &self,
        gateway_order_id: &str,
        order_id: &OrderId,
        amount: Option<Gel>,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayClientError> {
        if !self.api.config().has_credentials() {
            return Err(GatewayClientError::NotConfigured);
        }
        let opts = RequestOptions::with_idempotency_key(idempotency_key);
        let raw = self
            .api
            .refund_order(gateway_order_id, order_id.as_str(), amount.map(|g| g.to_decimal()), &opts)
            .await
            .map_err(gateway_error)?;
        let action_id = raw["action_id"]
            .as_str()
            .or_else(|| raw["id"].as_str())
            .map(String::from)
            .or_else(|| raw["action_id"].as_i64().map(|n| n.to_string()));
        Ok(RefundReceipt { action_id, raw })
    }
}

fn gateway_error(e: IpayApiError) -> GatewayClientError {
    match e {
        IpayApiError::MissingCredentials => GatewayClientError::NotConfigured,
        IpayApiError::Initialization(m) => GatewayClientError::Unavailable(m),
        IpayApiError::RestResponseError(m) => GatewayClientError::Unavailable(m),
        IpayApiError::EndpointsExhausted { label, last } => {
            GatewayClientError::Unavailable(format!("no {label} endpoint answered: {last}"))
        },
        IpayApiError::RefundEndpointNotFound { last } => GatewayClientError::RefundUnsupported(last),
        IpayApiError::TokenError { status, message } => GatewayClientError::Rejected { status, message },
        IpayApiError::QueryError { status, message } => GatewayClientError::Rejected { status, message },
        IpayApiError::TokenMissing => GatewayClientError::InvalidResponse(e.to_string()),
        IpayApiError::JsonError(m) => GatewayClientError::InvalidResponse(m),
    }
}

/// Convert a verified webhook notice into the engine's canonical update.
pub fn payment_update_from_notice(notice: PaymentNotice) -> PaymentUpdate {
    let refund_actions = notice
        .actions
        .iter()
        .filter_map(|action| status::classify_action(&action.action_type, action.amount))
        .collect();
    let amount = amount_from_payload(&notice.raw);
    debug!("💳️ Webhook notice for [{}] normalised with status '{}'", notice.external_order_id, notice.status_text);
    PaymentUpdate {
        order_id: OrderId(notice.external_order_id),
        gateway_order_id: notice.gateway_order_id,
        transaction_id: notice.transaction_id,
        amount,
        status_text: notice.status_text,
        payment_method: notice.payment_method,
        refund_actions,
        raw: notice.raw,
    }
}

/// Pull a captured amount out of the raw payload when one is present. Decimal GEL, as a number or a string.
fn amount_from_payload(payload: &Value) -> Option<Gel> {
    let value = payload
        .get("amount")
        .or_else(|| payload.get("purchase_units").and_then(|v| v.get("total_amount")))
        .or_else(|| payload.get("body").and_then(|b| b.get("amount")))?;
    let decimal = value.as_f64().or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok()))?;
    Gel::try_from(decimal).ok()
}
