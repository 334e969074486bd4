use chrono::{DateTime, Utc};
use spg_common::Gel;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{NewPayment, OrderId, Payment, PaymentStatus},
    sqlite::SqliteDatabaseError,
    traits::InsertPaymentResult,
};

#[derive(Debug, FromRow)]
pub(crate) struct PaymentRow {
    id: i64,
    order_id: OrderId,
    gateway_order_id: Option<String>,
    transaction_id: Option<String>,
    amount: Gel,
    status: PaymentStatus,
    payment_method: Option<String>,
    raw_payload: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = SqliteDatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let raw_payload = serde_json::from_str(&row.raw_payload)?;
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            gateway_order_id: row.gateway_order_id,
            transaction_id: row.transaction_id,
            amount: row.amount,
            status: row.status,
            payment_method: row.payment_method,
            raw_payload,
            created_at: row.created_at,
        })
    }
}

const PAYMENT_COLUMNS: &str =
    "id, order_id, gateway_order_id, transaction_id, amount, status, payment_method, raw_payload, created_at";

/// Insert a payment record unless an identical notification (same order, transaction id and status) has already
/// been recorded. Webhook replays hit the duplicate path.
pub async fn idempotent_insert(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentResult, SqliteDatabaseError> {
    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM payments \
         WHERE order_id = $1 AND status = $2 AND transaction_id IS $3 \
         ORDER BY id DESC LIMIT 1",
    )
    .bind(&payment.order_id)
    .bind(payment.status)
    .bind(&payment.transaction_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some((id,)) = existing {
        return Ok(InsertPaymentResult::AlreadyExists(id));
    }
    let raw = serde_json::to_string(&payment.raw_payload)?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, gateway_order_id, transaction_id, amount, status, payment_method, raw_payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id;
        "#,
    )
    .bind(&payment.order_id)
    .bind(&payment.gateway_order_id)
    .bind(&payment.transaction_id)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(&payment.payment_method)
    .bind(raw)
    .fetch_one(conn)
    .await?;
    Ok(InsertPaymentResult::Inserted(id))
}

pub async fn fetch_payments_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY id ASC"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Payment::try_from).collect()
}

pub async fn fetch_payments(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Payment::try_from).collect()
}
