//! # Payment engine public API
//!
//! * [`payment_flow_api`] is the primary API. It handles order creation, payment-notification processing, the
//!   refund flow and gateway reconciliation.
//! * [`auth_api`] wraps admin credential storage for the server's login flow.
//!
//! An API instance is created by supplying a backend that implements the trait contracts in [`crate::traits`].
pub mod auth_api;
pub mod errors;
pub mod order_objects;
pub mod payment_flow_api;

#[cfg(test)]
mod flow_tests;
