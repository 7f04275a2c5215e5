use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
        token_store,
    },
    config::Config,
    error::{AppError, AppResult},
    model::{
        role::Role,
        user::{USER_COLUMNS, User, UserCredentials},
    },
    models::{LoginReqDto, LoginResponse, RefreshReqDto, RefreshResponse, TokenType},
};
use actix_web::{HttpResponse, Responder, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    error!(error = %e, "Failed to sign token");
    AppError::Internal("Failed to issue token".into())
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials", body = Object, example = json!({
            "message": "Invalid credentials"
        }))
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<impl Responder> {
    info!("Login request received");

    // 1️⃣ Basic validation
    let email = user.email.trim().to_lowercase();
    if email.is_empty() || user.password.is_empty() {
        return Err(AppError::invalid("Email and password are required"));
    }

    // 2️⃣ Fetch user
    let db_user = sqlx::query_as::<_, UserCredentials>(
        "SELECT id, email, password, role FROM users WHERE email = ?",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        invalid_credentials()
    })?;

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid_credentials());
    }

    debug!(user_id = db_user.id, "Password verified");

    // 4️⃣ Issue tokens
    let access_token = generate_access_token(
        db_user.id,
        db_user.email.clone(),
        db_user.role.id(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        db_user.id,
        db_user.email.clone(),
        db_user.role.id(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    // 5️⃣ Store refresh token
    token_store::store_refresh_token(pool.get_ref(), &refresh_claims).await?;

    // 6️⃣ Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    let profile = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(db_user.id)
    .fetch_one(pool.get_ref())
    .await?;

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
        user: profile,
        expires_in: config.access_token_ttl,
    }))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshReqDto,
    responses(
        (status = 200, description = "Rotated tokens", body = RefreshResponse),
        (status = 401, description = "Refresh token invalid, expired, revoked or reused")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    body: web::Json<RefreshReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<impl Responder> {
    let unauthorized = || AppError::Unauthorized("Invalid refresh token".into());

    let claims = verify_token(&body.refresh_token, &config.jwt_secret).map_err(|e| {
        debug!(error = %e, "Refresh token verification failed");
        unauthorized()
    })?;

    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized());
    }

    let mut tx = pool.begin().await?;

    // 🔥 revoke old refresh token; a miss means reuse after rotation
    if !token_store::consume_refresh_token(&mut tx, &claims.jti).await? {
        info!(user_id = claims.user_id, "Refresh token reuse or revoked token");
        return Err(unauthorized());
    }

    // role may have changed since the token was issued
    let role: Role = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
        .bind(claims.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(unauthorized)?;

    // 🔄 issue new refresh token
    let (new_refresh_token, new_claims) = generate_refresh_token(
        claims.user_id,
        claims.sub.clone(),
        role.id(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    token_store::store_refresh_token(&mut *tx, &new_claims).await?;
    tx.commit().await?;

    // 🎫 new access token
    let access_token = generate_access_token(
        claims.user_id,
        claims.sub,
        role.id(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    Ok(HttpResponse::Ok().json(RefreshResponse {
        access_token,
        refresh_token: new_refresh_token,
        expires_in: config.access_token_ttl,
    }))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = RefreshReqDto,
    responses(
        (status = 204, description = "Logged out (also returned for unknown tokens)")
    ),
    tag = "Auth"
)]
pub async fn logout(
    body: web::Json<RefreshReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<impl Responder> {
    // only refresh tokens can logout; anything else is a silent no-op
    let claims = match verify_token(&body.refresh_token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return Ok(HttpResponse::NoContent().finish()),
    };

    token_store::revoke(pool.get_ref(), &claims.jti).await?;

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_test_user;

    async fn issue_refresh(pool: &MySqlPool, config: &Config, user_id: u64) -> String {
        let (token, claims) = generate_refresh_token(
            user_id,
            "ivy@company.com".into(),
            Role::Employee.id(),
            &config.jwt_secret,
            config.refresh_token_ttl,
        )
        .unwrap();
        token_store::store_refresh_token(pool, &claims).await.unwrap();
        token
    }

    async fn refresh(pool: &MySqlPool, config: &Config, token: &str) -> AppResult<HttpResponse> {
        refresh_token(
            web::Json(RefreshReqDto {
                refresh_token: token.to_string(),
            }),
            web::Data::new(pool.clone()),
            web::Data::new(config.clone()),
        )
        .await
        .map(|r| {
            let req = actix_web::test::TestRequest::default().to_http_request();
            r.respond_to(&req).map_into_boxed_body()
        })
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn replayed_refresh_token_is_unauthorized(pool: MySqlPool) {
        let config = Config::for_tests();
        let user_id = insert_test_user(&pool, "ivy@company.com", Role::Employee, None).await;
        let token = issue_refresh(&pool, &config, user_id).await;

        let first = refresh(&pool, &config, &token).await.unwrap();
        assert_eq!(first.status(), actix_web::http::StatusCode::OK);

        let replay = refresh(&pool, &config, &token).await;
        assert!(matches!(replay, Err(AppError::Unauthorized(_))));

        let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM auth_tokens WHERE revoked = FALSE")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(live, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn logged_out_token_cannot_refresh(pool: MySqlPool) {
        let config = Config::for_tests();
        let user_id = insert_test_user(&pool, "jo@company.com", Role::Employee, None).await;
        let token = issue_refresh(&pool, &config, user_id).await;

        let logged_out = logout(
            web::Json(RefreshReqDto {
                refresh_token: token.clone(),
            }),
            web::Data::new(pool.clone()),
            web::Data::new(config.clone()),
        )
        .await;
        assert!(logged_out.is_ok());

        let result = refresh(&pool, &config, &token).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
