//! Storefront Payment Engine
//!
//! The core logic for a food storefront's payment flows. The engine is gateway-agnostic: the HTTP server plugs a
//! concrete gateway client (see [`traits::GatewayClient`]) and a database backend (see
//! [`traits::PaymentGatewayDatabase`]) into the [`PaymentFlowApi`], which owns the rules about order lifecycles,
//! webhook-driven status transitions and refunds.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the only supported backend. Access goes through the
//!    trait contracts in [`mod@traits`] so that tests can substitute an in-memory store.
//! 2. The payment engine public API ([`mod@spe_api`]). This is where order creation, payment-notification processing,
//!    refunds and gateway reconciliation live.
//! 3. Events ([`mod@events`]). A small mpsc-based hook system lets the server attach async side effects (customer
//!    notifications, admin alerts) without the engine knowing about them.
pub mod db_types;
pub mod events;
pub mod status;
mod spe_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use spe_api::{
    auth_api::AuthApi,
    errors::{AuthApiError, PaymentFlowError},
    order_objects::{OrderQueryFilter, SyncReport},
    payment_flow_api::{CheckoutSummary, PaymentFlowApi, RefundResult, REFUND_WINDOW_DAYS},
};
pub use traits::{
    AuthManagement,
    GatewayClient,
    InsertOrderResult,
    InsertPaymentResult,
    PaymentGatewayDatabase,
};
