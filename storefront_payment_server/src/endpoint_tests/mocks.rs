use mockall::mock;
use storefront_payment_engine::{db_types::AdminUser, traits::AuthManagement, AuthApiError};

mock! {
    pub AuthManager {}
    impl AuthManagement for AuthManager {
        async fn fetch_admin_user(&self, username: &str) -> Result<Option<AdminUser>, AuthApiError>;
        async fn upsert_admin_user(&self, username: &str, password_hash: &str) -> Result<(), AuthApiError>;
    }
}
