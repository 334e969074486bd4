use crate::{db_types::AdminUser, spe_api::errors::AuthApiError};

/// Admin credential storage.
///
/// Password verification itself happens at the server layer; the engine only stores and retrieves the
/// `salt:hex(hmac_sha256)` hash strings.
#[allow(async_fn_in_trait)]
pub trait AuthManagement {
    async fn fetch_admin_user(&self, username: &str) -> Result<Option<AdminUser>, AuthApiError>;

    /// Create the admin user, or replace its password hash if it already exists. Used for operator-driven seeding.
    async fn upsert_admin_user(&self, username: &str, password_hash: &str) -> Result<(), AuthApiError>;
}
