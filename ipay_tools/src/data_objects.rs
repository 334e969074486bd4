use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Order-creation payload in the shape the iPay checkout API expects. Amounts are decimal GEL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub callback_url: String,
    pub external_order_id: String,
    pub purchase_units: PurchaseUnits,
    pub redirect_urls: RedirectUrls,
    pub buyer: Buyer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<Merchant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseUnits {
    pub currency: String,
    pub total_amount: f64,
    pub basket: Vec<BasketItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketItem {
    pub product_id: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectUrls {
    pub success: String,
    pub fail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buyer {
    pub full_name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Merchant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inn: Option<String>,
}

/// Raw order-creation response. The response shape varies by API generation, so the interesting fields are exposed
/// through accessors over the raw JSON rather than a fixed struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse(pub Value);

impl CreateOrderResponse {
    /// The URL of the gateway-hosted payment page. Every API generation names this differently.
    pub fn redirect_url(&self) -> Option<&str> {
        self.0["redirect_url"]
            .as_str()
            .or_else(|| self.0["_links"]["redirect"]["href"].as_str())
            .or_else(|| self.0["paymentUrl"].as_str())
            .or_else(|| self.0["redirectUrl"].as_str())
            .or_else(|| self.0["url"].as_str())
    }

    pub fn gateway_order_id(&self) -> Option<String> {
        let id = &self.0["id"];
        id.as_str()
            .map(String::from)
            .or_else(|| id.as_i64().map(|n| n.to_string()))
            .or_else(|| self.0["order_id"].as_str().map(String::from))
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
