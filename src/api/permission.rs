use crate::api::{Filter, FilterValue, Paginated, ReviewNotes, optional_json, page_window, review};
use crate::auth::auth::AuthUser;
use crate::auth::policy::{Action, Resource};
use crate::engine::approval::{Reviewable, Verdict};
use crate::error::{AppError, AppResult};
use crate::model::decision::ApprovalStatus;
use crate::model::permission::{PERMISSION_COLUMNS, Permission, PermissionKind, check_duration};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermission {
    #[schema(example = "other")]
    pub kind: PermissionKind,
    #[schema(example = "Doctor appointment")]
    pub note: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    #[schema(example = 60)]
    pub duration: Option<i32>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PermissionQuery {
    /// Filter by user (privileged roles only)
    pub user_id: Option<u64>,
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>, example = "pending")]
    pub status: Option<ApprovalStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn fetch_permission(pool: &MySqlPool, id: u64) -> AppResult<Permission> {
    sqlx::query_as::<_, Permission>(&format!(
        "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Permission not found"))
}

/// Submit a standalone permission request
#[utoipa::path(
    post,
    path = "/api/permissions",
    request_body = CreatePermission,
    responses(
        (status = 201, description = "Permission request created", body = Permission),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn create_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePermission>,
) -> AppResult<impl Responder> {
    auth.require(Action::Create, Resource::Permission)?;

    check_duration(payload.duration)?;

    let result = sqlx::query(
        r#"
        INSERT INTO permissions
            (user_id, kind, note, description, file_url, duration_minutes, status)
        VALUES (?, ?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.kind)
    .bind(&payload.note)
    .bind(&payload.description)
    .bind(&payload.file_url)
    .bind(payload.duration)
    .execute(pool.get_ref())
    .await?;

    info!(user_id = auth.user_id, kind = %payload.kind, "Permission requested");

    let permission = fetch_permission(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(permission))
}

/// List permission requests (own, or everyone's for privileged roles)
#[utoipa::path(
    get,
    path = "/api/permissions",
    params(PermissionQuery),
    responses(
        (status = 200, description = "Paginated permissions", body = [Permission]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn list_permissions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PermissionQuery>,
) -> AppResult<impl Responder> {
    let mut filter = Filter::default();

    if auth.can(Action::ReadAll, Resource::Permission) {
        if let Some(user_id) = query.user_id {
            filter.push("user_id = ?", FilterValue::U64(user_id));
        }
    } else {
        let user_id = auth.target_user(query.user_id, Action::ReadAll, Resource::Permission)?;
        filter.push("user_id = ?", FilterValue::U64(user_id));
    }

    if let Some(status) = query.status {
        filter.push("status = ?", FilterValue::Str(status.to_string()));
    }

    let (page, per_page, offset) = page_window(query.page, query.per_page);
    let total = filter.count(pool.get_ref(), "permissions").await?;
    let data: Vec<Permission> = filter
        .fetch_page(
            pool.get_ref(),
            &format!("SELECT {PERMISSION_COLUMNS} FROM permissions"),
            "created_at DESC",
            per_page,
            offset,
        )
        .await?;

    Ok(HttpResponse::Ok().json(Paginated {
        data,
        page,
        per_page,
        total,
    }))
}

async fn decide_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    id: u64,
    verdict: Verdict,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let notes = optional_json::<ReviewNotes>(&body)?.notes;

    review(
        pool.get_ref(),
        &auth,
        Reviewable::Permission,
        id,
        verdict,
        notes.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(fetch_permission(pool.get_ref(), id).await?))
}

/// Approve a pending permission (manager/owner)
#[utoipa::path(
    patch,
    path = "/api/permissions/{id}/approve",
    params(("id" = u64, Path, description = "Permission id")),
    request_body = ReviewNotes,
    responses(
        (status = 200, description = "Permission approved", body = Permission),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Permission not found"),
        (status = 409, description = "Permission is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn approve_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Bytes,
) -> AppResult<impl Responder> {
    decide_permission(auth, pool, path.into_inner(), Verdict::Approved, body).await
}

/// Reject a pending permission (manager/owner)
#[utoipa::path(
    patch,
    path = "/api/permissions/{id}/reject",
    params(("id" = u64, Path, description = "Permission id")),
    request_body = ReviewNotes,
    responses(
        (status = 200, description = "Permission rejected", body = Permission),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Permission not found"),
        (status = 409, description = "Permission is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn reject_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Bytes,
) -> AppResult<impl Responder> {
    decide_permission(auth, pool, path.into_inner(), Verdict::Rejected, body).await
}
