pub mod ipay;
pub mod whatsapp;

pub use ipay::{payment_update_from_notice, IpayGateway};
pub use whatsapp::WhatsAppNotifier;
