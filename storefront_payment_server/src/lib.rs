//! # Storefront payment server
//! The HTTP face of the storefront payment subsystem. It is responsible for:
//! * Accepting new orders from the storefront and opening iPay checkout sessions for them.
//! * Listening for incoming payment notifications from the gateway, verifying their signatures, and feeding them to
//!   the payment engine.
//! * Exposing the admin API for order management, refunds and gateway reconciliation.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/orders`, `/orders/status`: Customer-facing order creation and status.
//! * `/payments/webhook`: The webhook route for payment notifications from the gateway.
//! * `/auth/login`: Admin login.
//! * `/api/*`: Admin routes. These require a valid admin session token.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
