use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

use crate::auth::password::hash_password;
use crate::model::role::Role;

pub async fn init_db(database_url: &str) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(pool)
}

/// Creates the first owner account on an empty database.
pub async fn seed_owner(pool: &MySqlPool, email: &str, password: &str) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Ok(());
    }

    let hashed = hash_password(password).map_err(|e| anyhow::anyhow!("{e}"))?;

    sqlx::query(
        r#"
        INSERT INTO users (name, email, password, role)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind("Owner")
    .bind(email.trim().to_lowercase())
    .bind(hashed)
    .bind(Role::Owner.as_ref())
    .execute(pool)
    .await?;

    info!(email, "Seeded owner account");
    Ok(())
}

/// Inserts a user with a throwaway password hash and returns its id.
#[cfg(test)]
pub async fn insert_test_user(pool: &MySqlPool, email: &str, role: Role, division: Option<&str>) -> u64 {
    sqlx::query("INSERT INTO users (name, email, password, role, division) VALUES (?, ?, 'x', ?, ?)")
        .bind(email.split('@').next().unwrap_or(email))
        .bind(email)
        .bind(role.as_ref())
        .bind(division)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_id()
}
