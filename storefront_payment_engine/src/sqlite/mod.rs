pub mod auth;
mod errors;
pub mod orders;
pub mod payments;
mod sqlite_impl;


use std::env;

pub use errors::SqliteDatabaseError;
use log::info;
use sqlx::{
    migrate::{MigrateDatabase, Migrator},
    sqlite::SqlitePoolOptions,
    Sqlite,
    SqlitePool,
};
pub use sqlite_impl::SqliteDatabase;

const SQLITE_DB_URL: &str = "sqlite://data/storefront.db";

/// The embedded schema migrations. They run every time a pool is opened, so a server pointed at a fresh database
/// URL comes up with the full schema and no separate setup step.
pub static MIGRATOR: Migrator = sqlx::migrate!("./src/sqlite/migrations");

pub fn db_url() -> String {
    let result = env::var("SPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("SPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("🗃️ Database {url} does not exist yet. Creating it.");
        Sqlite::create_database(url).await?;
    }
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}
