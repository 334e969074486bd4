use log::*;
use serde_json::{Map, Value};
use spg_common::Gel;
use thiserror::Error;

/// One canonical, already-normalised payment notification.
///
/// iPay's webhook shape has been observed to vary: fields arrive top-level or nested under a `body` key, the status
/// is sometimes a plain string and sometimes a `{key, value}` object, and the content type flips between JSON and
/// form-urlencoded. All of that variance is resolved here, at the boundary, so downstream code never branches on
/// payload shape.
#[derive(Debug, Clone)]
pub struct PaymentNotice {
    /// The merchant-side (storefront) order id.
    pub external_order_id: String,
    pub gateway_order_id: Option<String>,
    pub transaction_id: Option<String>,
    /// The raw gateway status text, prior to normalisation.
    pub status_text: String,
    pub payment_method: Option<String>,
    pub actions: Vec<CallbackAction>,
    /// The full payload as received, for audit storage.
    pub raw: Value,
}

/// An entry of the gateway's `actions` array. Refund entries carry the amounts used to tell full from partial
/// refunds, since the gateway's own "refunded" status string does not distinguish the two.
#[derive(Debug, Clone)]
pub struct CallbackAction {
    pub action_type: String,
    pub amount: Gel,
}

#[derive(Debug, Clone, Error)]
pub enum CallbackError {
    #[error("Notification payload could not be parsed as JSON or form data")]
    InvalidPayload,
    #[error("Notification payload carries no merchant order identifier")]
    MissingOrderId,
    #[error("Notification payload carries no status")]
    MissingStatus,
}

impl PaymentNotice {
    /// Parse a raw webhook body of unknown content type into a canonical notice.
    ///
    /// JSON is attempted first, then form-urlencoded, regardless of the advertised content type; the gateway has
    /// been seen to mislabel both.
    pub fn parse(content_type: Option<&str>, raw: &[u8]) -> Result<Self, CallbackError> {
        let ct = content_type.unwrap_or_default().to_ascii_lowercase();
        let value = if ct.contains("application/x-www-form-urlencoded") {
            parse_form(raw).or_else(|_| parse_json(raw))?
        } else {
            parse_json(raw).or_else(|_| parse_form(raw))?
        };
        Self::from_value(value)
    }

    /// Normalise an already-parsed payload. Fields nested under a `body` key take precedence over top-level ones.
    pub fn from_value(raw: Value) -> Result<Self, CallbackError> {
        let flat = match raw.get("body") {
            Some(Value::Object(inner)) => {
                let mut merged = raw.as_object().cloned().unwrap_or_default();
                for (k, v) in inner {
                    merged.insert(k.clone(), v.clone());
                }
                Value::Object(merged)
            },
            _ => raw.clone(),
        };
        let external_order_id = first_string(&flat, &[
            "external_order_id",
            "externalOrderId",
            "merchantOrderId",
            "merchantOrderReference",
            "orderId",
        ])
        .ok_or(CallbackError::MissingOrderId)?;
        let status_text = status_text(&flat).ok_or(CallbackError::MissingStatus)?;
        let gateway_order_id = first_string(&flat, &["id", "order_id", "payment_hash"]);
        let transaction_id = first_string(&flat, &["transaction_id", "transactionId"]);
        let payment_method = flat
            .get("payment_method")
            .or_else(|| flat.get("paymentMethod"))
            .and_then(|v| v.as_str().map(String::from).or_else(|| v["key"].as_str().map(String::from)));
        let actions = parse_actions(&flat);
        trace!("🧾️ Parsed payment notice for [{external_order_id}] with status '{status_text}'");
        Ok(Self { external_order_id, gateway_order_id, transaction_id, status_text, payment_method, actions, raw })
    }
}

/// Extract the raw status text from any of the observed payload shapes: `order_status` / `status` /
/// `payment_status`, each either a plain string or a `{key, value}` object.
pub fn status_text(payload: &Value) -> Option<String> {
    ["order_status", "status", "payment_status", "paymentStatus"].iter().find_map(|key| {
        let v = payload.get(*key)?;
        v.as_str()
            .map(String::from)
            .or_else(|| v["key"].as_str().map(String::from))
            .or_else(|| v["value"].as_str().map(String::from))
    })
}

fn parse_json(raw: &[u8]) -> Result<Value, CallbackError> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(v) if v.is_object() => Ok(v),
        _ => Err(CallbackError::InvalidPayload),
    }
}

fn parse_form(raw: &[u8]) -> Result<Value, CallbackError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(raw).map_err(|_| CallbackError::InvalidPayload)?;
    if pairs.is_empty() {
        return Err(CallbackError::InvalidPayload);
    }
    let mut map = Map::with_capacity(pairs.len());
    for (k, v) in pairs {
        // Some tenants stuff a JSON document into a single form field.
        let value = serde_json::from_str::<Value>(&v).unwrap_or(Value::String(v));
        map.insert(k, value);
    }
    Ok(Value::Object(map))
}

fn first_string(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let v = payload.get(*key)?;
        v.as_str().map(String::from).or_else(|| v.as_i64().map(|n| n.to_string()))
    })
}

fn parse_actions(payload: &Value) -> Vec<CallbackAction> {
    let Some(actions) = payload.get("actions").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    actions
        .iter()
        .filter_map(|action| {
            let action_type = action
                .get("action_type")
                .or_else(|| action.get("type"))
                .and_then(|v| v.as_str())
                .map(String::from)?;
            let amount = action.get("amount").map(parse_amount).unwrap_or_default();
            Some(CallbackAction { action_type, amount })
        })
        .collect()
}

/// Amounts arrive as decimal GEL, either as a number or a numeric string.
fn parse_amount(value: &Value) -> Gel {
    let decimal = value.as_f64().or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok())).unwrap_or(0.0);
    Gel::try_from(decimal).unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_json_shape() {
        let raw = json!({"external_order_id": "ord-1", "order_status": "success", "id": "gw-9"});
        let notice = PaymentNotice::from_value(raw).unwrap();
        assert_eq!(notice.external_order_id, "ord-1");
        assert_eq!(notice.status_text, "success");
        assert_eq!(notice.gateway_order_id.as_deref(), Some("gw-9"));
    }

    #[test]
    fn body_nested_shape_with_status_object() {
        let raw = json!({"event": "order_payment", "body": {
            "external_order_id": "ord-2",
            "order_status": {"key": "completed", "value": "დასრულებული"},
            "payment_method": {"key": "card"}
        }});
        let notice = PaymentNotice::from_value(raw).unwrap();
        assert_eq!(notice.external_order_id, "ord-2");
        assert_eq!(notice.status_text, "completed");
        assert_eq!(notice.payment_method.as_deref(), Some("card"));
    }

    #[test]
    fn form_encoded_body() {
        let raw = b"orderId=ord-3&status=rejected";
        let notice = PaymentNotice::parse(Some("application/x-www-form-urlencoded"), raw).unwrap();
        assert_eq!(notice.external_order_id, "ord-3");
        assert_eq!(notice.status_text, "rejected");
    }

    #[test]
    fn json_despite_form_content_type() {
        let raw = br#"{"merchantOrderId": "ord-4", "payment_status": "ok"}"#;
        let notice = PaymentNotice::parse(Some("application/x-www-form-urlencoded"), raw).unwrap();
        assert_eq!(notice.external_order_id, "ord-4");
        assert_eq!(notice.status_text, "ok");
    }

    #[test]
    fn refund_actions_are_collected() {
        let raw = json!({"external_order_id": "ord-5", "order_status": "refunded", "actions": [
            {"action_type": "authorize", "amount": "40.00"},
            {"action_type": "refund", "amount": "15.00"},
            {"type": "refund_request", "amount": 10}
        ]});
        let notice = PaymentNotice::from_value(raw).unwrap();
        assert_eq!(notice.actions.len(), 3);
        assert_eq!(notice.actions[1].amount, Gel::from_tetri(1500));
        assert_eq!(notice.actions[2].amount, Gel::from_gel(10));
    }

    #[test]
    fn missing_identifiers_are_rejected() {
        assert!(matches!(
            PaymentNotice::from_value(json!({"order_status": "success"})),
            Err(CallbackError::MissingOrderId)
        ));
        assert!(matches!(
            PaymentNotice::from_value(json!({"external_order_id": "x"})),
            Err(CallbackError::MissingStatus)
        ));
    }
}
