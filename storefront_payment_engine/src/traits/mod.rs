//! Contracts between the payment engine and its pluggable parts.
//!
//! * [`PaymentGatewayDatabase`] is the storage contract. The SQLite backend implements it for production; the test
//!   utilities provide an in-memory implementation.
//! * [`AuthManagement`] covers admin credential storage.
//! * [`GatewayClient`] is the outbound side: whatever can create checkout sessions, answer status queries and issue
//!   refunds can drive the payment flows.
mod auth_management;
mod data_objects;
mod gateway_client;
mod payment_gateway_database;

pub use auth_management::AuthManagement;
pub use data_objects::{InsertOrderResult, InsertPaymentResult};
pub use gateway_client::{CheckoutRequest, CheckoutSession, GatewayClient, GatewayClientError, RefundReceipt, RemoteStatus};
pub use payment_gateway_database::PaymentGatewayDatabase;
