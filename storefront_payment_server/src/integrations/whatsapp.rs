//! WhatsApp Cloud API notifications.
//!
//! The notifier is attached to the engine's event hooks: the order-paid hook alerts the operator number that a new
//! paid order is waiting for the kitchen, and the manual-refund hook alerts the same number when a refund needs
//! hand-processing. Delivery failures are logged and swallowed; a messaging outage must never affect payment
//! processing.

use log::*;
use reqwest::Client;
use serde_json::json;
use spg_common::Gel;
use storefront_payment_engine::{db_types::Order, events::EventHooks};

use crate::config::WhatsAppConfig;

#[derive(Clone)]
pub struct WhatsAppNotifier {
    config: WhatsAppConfig,
    client: Client,
}

impl WhatsAppNotifier {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self { config, client: Client::new() }
    }

    /// Register the notifier on the engine's event hooks.
    pub fn attach(&self, hooks: &mut EventHooks) {
        let notifier = self.clone();
        hooks.on_order_paid(move |event| {
            let notifier = notifier.clone();
            Box::pin(async move {
                notifier.send_order_paid(&event.order).await;
            })
        });
        let notifier = self.clone();
        hooks.on_manual_refund(move |event| {
            let notifier = notifier.clone();
            Box::pin(async move {
                notifier.send_manual_refund_alert(&event.order, event.amount).await;
            })
        });
    }

    pub async fn send_order_paid(&self, order: &Order) {
        let Some(admin_number) = &self.config.admin_number else {
            warn!("📣️ No WHATSAPP_ADMIN_NUMBER is configured. Paid order {} goes unannounced.", order.order_id);
            return;
        };
        let items = order
            .items
            .iter()
            .map(|item| format!("{}x {}", item.quantity, item.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut message = format!(
            "New paid order {}: {} for {}.\nCustomer: {} ({}).",
            order.order_id,
            items,
            order.total_price,
            order.customer_name(),
            order.customer_phone
        );
        if let Some(address) = &order.delivery_address {
            message.push_str(&format!("\nDeliver to: {address}."));
        }
        if let Some(point) = &order.location {
            message.push_str(&format!("\nMap: https://maps.google.com/?q={},{}", point.lat, point.lng));
        }
        self.send_text(admin_number, &message).await;
    }

    pub async fn send_manual_refund_alert(&self, order: &Order, amount: Gel) {
        let Some(admin_number) = &self.config.admin_number else {
            warn!("📣️ No WHATSAPP_ADMIN_NUMBER is configured. Manual refund for order {} goes unannounced.", order.order_id);
            return;
        };
        let message = format!(
            "Manual refund required: return {amount} to {} ({}) for order {}. The gateway could not process it.",
            order.customer_name(),
            order.customer_phone,
            order.order_id
        );
        self.send_text(admin_number, &message).await;
    }

    async fn send_text(&self, to: &str, message: &str) {
        if !self.config.enabled {
            debug!("📣️ WhatsApp notifications are disabled. Dropping message to {to}.");
            return;
        }
        let url = format!("{}/{}/messages", self.config.api_base, self.config.phone_number_id);
        let body = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": message },
        });
        let result = self
            .client
            .post(&url)
            .bearer_auth(self.config.access_token.reveal())
            .json(&body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!("📣️ WhatsApp message delivered to {to}");
            },
            Ok(response) => {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                warn!("📣️ WhatsApp API rejected the message to {to}. {status}. {detail}");
            },
            Err(e) => {
                warn!("📣️ Could not reach the WhatsApp API. {e}");
            },
        }
    }
}
