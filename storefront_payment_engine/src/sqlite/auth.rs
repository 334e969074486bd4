use sqlx::SqliteConnection;

use crate::{db_types::AdminUser, sqlite::SqliteDatabaseError};

pub async fn fetch_admin_user(
    username: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<AdminUser>, SqliteDatabaseError> {
    let user = sqlx::query_as::<_, AdminUser>(
        "SELECT id, username, password_hash, created_at FROM admin_users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(conn)
    .await?;
    Ok(user)
}

pub async fn upsert_admin_user(
    username: &str,
    password_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO admin_users (username, password_hash) VALUES ($1, $2)
            ON CONFLICT (username) DO UPDATE SET password_hash = excluded.password_hash;
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .execute(conn)
    .await?;
    Ok(())
}
