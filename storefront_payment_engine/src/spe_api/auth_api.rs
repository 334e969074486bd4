use crate::{db_types::AdminUser, spe_api::errors::AuthApiError, traits::AuthManagement};

/// Thin wrapper over admin credential storage. Session issuance and password verification live at the server layer.
#[derive(Debug, Clone)]
pub struct AuthApi<B> {
    db: B,
}

impl<B> AuthApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B: AuthManagement> AuthApi<B> {
    pub async fn fetch_admin_user(&self, username: &str) -> Result<AdminUser, AuthApiError> {
        self.db.fetch_admin_user(username).await?.ok_or(AuthApiError::UserNotFound)
    }

    pub async fn upsert_admin_user(&self, username: &str, password_hash: &str) -> Result<(), AuthApiError> {
        self.db.upsert_admin_user(username, password_hash).await
    }
}
