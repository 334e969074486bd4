use chrono::{DateTime, Utc};
use log::trace;
use spg_common::Gel;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{MapPoint, NewOrder, Order, OrderId, OrderStatusType, RefundDetail},
    spe_api::order_objects::OrderQueryFilter,
    sqlite::SqliteDatabaseError,
    traits::InsertOrderResult,
};

/// The raw orders row. The JSON columns (`items`, `location`, `refund_detail`) are stored as text and decoded in
/// [`Order::try_from`].
#[derive(Debug, FromRow)]
pub(crate) struct OrderRow {
    id: i64,
    order_id: OrderId,
    first_name: String,
    last_name: String,
    customer_phone: String,
    delivery_address: Option<String>,
    location: Option<String>,
    items: String,
    total_price: Gel,
    currency: String,
    status: OrderStatusType,
    gateway_order_id: Option<String>,
    payment_url: Option<String>,
    notification_sent: bool,
    refund_detail: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = SqliteDatabaseError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let items = serde_json::from_str(&row.items)?;
        let location: Option<MapPoint> = row.location.as_deref().map(serde_json::from_str).transpose()?;
        let refund_detail: Option<RefundDetail> =
            row.refund_detail.as_deref().map(serde_json::from_str).transpose()?;
        Ok(Order {
            id: row.id,
            order_id: row.order_id,
            first_name: row.first_name,
            last_name: row.last_name,
            customer_phone: row.customer_phone,
            delivery_address: row.delivery_address,
            location,
            items,
            total_price: row.total_price,
            currency: row.currency,
            status: row.status,
            gateway_order_id: row.gateway_order_id,
            payment_url: row.payment_url,
            notification_sent: row.notification_sent,
            refund_detail,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_id, first_name, last_name, customer_phone, delivery_address, location, \
                             items, total_price, currency, status, gateway_order_id, payment_url, \
                             notification_sent, refund_detail, created_at, updated_at";

pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let result = match order_exists(&order.order_id, conn).await? {
        Some(id) => InsertOrderResult::AlreadyExists(id),
        None => insert_order(order, conn).await?,
    };
    Ok(result)
}

async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let items = serde_json::to_string(&order.items)?;
    let location = order.location.as_ref().map(serde_json::to_string).transpose()?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, first_name, last_name, customer_phone, delivery_address, location, items,
                                total_price, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.first_name)
    .bind(&order.last_name)
    .bind(&order.customer_phone)
    .bind(&order.delivery_address)
    .bind(location)
    .bind(items)
    .bind(order.total_price)
    .bind(&order.currency)
    .fetch_one(conn)
    .await?;
    Ok(InsertOrderResult::Inserted(id))
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 LIMIT 1"
    ))
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    row.map(Order::try_from).transpose()
}

pub async fn fetch_order_by_gateway_id(
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE gateway_order_id = $1 LIMIT 1"
    ))
    .bind(gateway_order_id)
    .fetch_optional(conn)
    .await?;
    row.map(Order::try_from).transpose()
}

pub async fn order_exists(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<i64>, SqliteDatabaseError> {
    let id: Option<(i64,)> = sqlx::query_as("SELECT id FROM orders WHERE order_id = $1 LIMIT 1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(id.map(|(id,)| id))
}

pub async fn fetch_orders(
    filter: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1"));
    if let Some(order_id) = &filter.order_id {
        builder.push(" AND order_id = ").push_bind(order_id.clone());
    }
    if let Some(phone) = &filter.customer_phone {
        builder.push(" AND customer_phone = ").push_bind(phone.clone());
    }
    if !filter.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in &filter.statuses {
            separated.push_bind(*status);
        }
        separated.push_unseparated(")");
    }
    if let Some(since) = filter.since {
        builder.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND created_at <= ").push_bind(until);
    }
    if filter.with_gateway_session {
        builder.push(" AND gateway_order_id IS NOT NULL");
    }
    builder.push(" ORDER BY created_at DESC");
    trace!("🗃️ Order query: {}", builder.sql());
    let rows = builder.build_query_as::<OrderRow>().fetch_all(conn).await?;
    rows.into_iter().map(Order::try_from).collect()
}

pub async fn update_order_status(
    order_id: &OrderId,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2")
        .bind(status)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::OrderNotFound(order_id.clone()));
    }
    fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::OrderNotFound(order_id.clone()))
}

pub async fn attach_gateway_session(
    order_id: &OrderId,
    gateway_order_id: &str,
    payment_url: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE orders SET gateway_order_id = $1, payment_url = $2, updated_at = CURRENT_TIMESTAMP \
         WHERE order_id = $3",
    )
    .bind(gateway_order_id)
    .bind(payment_url)
    .bind(order_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::OrderNotFound(order_id.clone()));
    }
    Ok(())
}

/// Compare-and-set on the notification flag. Exactly one concurrent caller sees `true`.
pub async fn acquire_notification_slot(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result =
        sqlx::query("UPDATE orders SET notification_sent = 1 WHERE order_id = $1 AND notification_sent = 0")
            .bind(order_id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_refund_detail(
    order_id: &OrderId,
    detail: &RefundDetail,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let detail = serde_json::to_string(detail)?;
    let result =
        sqlx::query("UPDATE orders SET refund_detail = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2")
            .bind(detail)
            .bind(order_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::OrderNotFound(order_id.clone()));
    }
    Ok(())
}
