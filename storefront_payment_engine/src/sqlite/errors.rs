use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database query error: {0}")]
    QueryError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Could not decode a JSON column: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Order {0} was not found")]
    OrderNotFound(OrderId),
}
