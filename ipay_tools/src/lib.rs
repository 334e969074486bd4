//! Client tooling for the Bank of Georgia iPay payment processor.
//!
//! The deployed iPay REST surface is not fully documented and differs by tenant and API generation, so the client
//! treats endpoint instability as a first-class failure mode: every call runs against an ordered list of candidate
//! endpoint paths (see [`EndpointStrategy`]) instead of a single hard-coded URL.

mod api;
mod callback;
mod config;
mod data_objects;
mod error;

pub use api::{EndpointStrategy, IpayApi, RequestOptions};
pub use callback::{status_text, CallbackAction, CallbackError, PaymentNotice};
pub use config::IpayConfig;
pub use data_objects::{BasketItem, Buyer, CreateOrderRequest, CreateOrderResponse, Merchant, PurchaseUnits, RedirectUrls};
pub use error::IpayApiError;
