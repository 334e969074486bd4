use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use crate::{
    db_types::{AdminUser, NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment, RefundDetail},
    spe_api::{errors::AuthApiError, order_objects::OrderQueryFilter},
    sqlite::{auth, db_url, new_pool, orders, payments, SqliteDatabaseError},
    traits::{AuthManagement, InsertOrderResult, InsertPaymentResult, PaymentGatewayDatabase},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::idempotent_insert(order.clone(), &mut conn).await?;
        if let InsertOrderResult::Inserted(id) = &result {
            debug!("🗃️ Order {} has been saved in the DB with id {id}", order.order_id);
        }
        Ok(result)
    }

    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn fetch_order_by_gateway_id(&self, gateway_order_id: &str) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_gateway_id(gateway_order_id, &mut conn).await
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders(filter, &mut conn).await
    }

    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::update_order_status(order_id, status, &mut conn).await?;
        trace!("🗃️ Order {order_id} status written as '{status}'");
        Ok(order)
    }

    async fn attach_gateway_session(
        &self,
        order_id: &OrderId,
        gateway_order_id: &str,
        payment_url: &str,
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::attach_gateway_session(order_id, gateway_order_id, payment_url, &mut conn).await?;
        trace!("🗃️ Order {order_id} linked to gateway session {gateway_order_id}");
        Ok(())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::idempotent_insert(payment, &mut conn).await
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_order(order_id, &mut conn).await
    }

    async fn fetch_payments(&self, limit: i64) -> Result<Vec<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments(limit, &mut conn).await
    }

    async fn acquire_notification_slot(&self, order_id: &OrderId) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::acquire_notification_slot(order_id, &mut conn).await
    }

    async fn set_refund_detail(&self, order_id: &OrderId, detail: &RefundDetail) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::set_refund_detail(order_id, detail, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl AuthManagement for SqliteDatabase {
    async fn fetch_admin_user(&self, username: &str) -> Result<Option<AdminUser>, AuthApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        auth::fetch_admin_user(username, &mut conn).await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))
    }

    async fn upsert_admin_user(&self, username: &str, password_hash: &str) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        auth::upsert_admin_user(username, password_hash, &mut conn)
            .await
            .map_err(|e| AuthApiError::DatabaseError(e.to_string()))
    }
}
