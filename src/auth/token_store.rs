use std::time::Duration;

use anyhow::Result;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{debug, error, info};

use crate::models::Claims;

/// Persists a freshly issued refresh token.
pub async fn store_refresh_token<'c, E>(executor: E, claims: &Claims) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    debug!(user_id = claims.user_id, jti = %claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO auth_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(executor)
    .await?;

    Ok(())
}

/// Marks a live refresh token as used. Returns false when the token is unknown,
/// expired, or already revoked, which is how reuse after rotation is detected.
pub async fn consume_refresh_token(
    tx: &mut Transaction<'_, MySql>,
    jti: &str,
) -> Result<bool, sqlx::Error> {
    let row: Option<(u64,)> = sqlx::query_as(
        r#"
        SELECT id
        FROM auth_tokens
        WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()
        FOR UPDATE
        "#,
    )
    .bind(jti)
    .fetch_optional(&mut **tx)
    .await?;

    let Some((id,)) = row else {
        return Ok(false);
    };

    sqlx::query("UPDATE auth_tokens SET revoked = TRUE WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(true)
}

/// Idempotent revocation used by logout.
pub async fn revoke(pool: &MySqlPool, jti: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE auth_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(jti)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn purge_expired(pool: &MySqlPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Background sweep replacing a TTL index on `auth_tokens`.
pub async fn run_purge_loop(pool: MySqlPool, every: Duration) {
    let mut interval = actix_web::rt::time::interval(every);
    loop {
        interval.tick().await;
        match purge_expired(&pool).await {
            Ok(0) => {}
            Ok(n) => info!(purged = n, "Expired refresh tokens purged"),
            Err(e) => error!(error = %e, "Failed to purge expired refresh tokens"),
        }
    }
}
