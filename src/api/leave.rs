use crate::api::{Filter, FilterValue, Paginated, now, page_window};
use crate::auth::auth::AuthUser;
use crate::auth::policy::{Action, Resource};
use crate::engine::leave::{self, ApplyLeave};
use crate::error::AppResult;
use crate::model::leave::{LEAVE_COLUMNS, LeaveRecord, LeaveType};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by user (privileged roles only)
    pub user_id: Option<u64>,
    #[serde(rename = "type")]
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>, example = "annual")]
    pub leave_type: Option<LeaveType>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Organization leave quota
#[utoipa::path(
    get,
    path = "/api/leaves/quota",
    responses(
        (status = 200, description = "Current quota", body = crate::model::leave::LeaveQuota),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_quota(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<impl Responder> {
    auth.require(Action::Read, Resource::LeaveQuota)?;

    let quota = leave::load_quota(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(quota))
}

/// Apply for leave; the balance is reconciled immediately
#[utoipa::path(
    post,
    path = "/api/leaves/apply",
    request_body = ApplyLeave,
    responses(
        (status = 201, description = "Leave recorded with remaining balances", body = crate::engine::leave::LeaveApplied),
        (status = 400, description = "Invalid dates or days"),
        (status = 403, description = "Applying for another user without privilege"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApplyLeave>,
) -> AppResult<impl Responder> {
    auth.require(Action::Create, Resource::Leave)?;
    let user_id = auth.target_user(payload.user_id, Action::ActOnBehalf, Resource::Leave)?;

    let applied = leave::apply(pool.get_ref(), user_id, &payload, now().date()).await?;
    Ok(HttpResponse::Created().json(applied))
}

/// Leave history
#[utoipa::path(
    get,
    path = "/api/leaves",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave records", body = [LeaveRecord]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> AppResult<impl Responder> {
    let mut filter = Filter::default();

    if auth.can(Action::ReadAll, Resource::Leave) {
        if let Some(user_id) = query.user_id {
            filter.push("user_id = ?", FilterValue::U64(user_id));
        }
    } else {
        let user_id = auth.target_user(query.user_id, Action::ReadAll, Resource::Leave)?;
        filter.push("user_id = ?", FilterValue::U64(user_id));
    }

    if let Some(leave_type) = query.leave_type {
        filter.push("type = ?", FilterValue::Str(leave_type.to_string()));
    }

    let (page, per_page, offset) = page_window(query.page, query.per_page);
    let total = filter.count(pool.get_ref(), "leave_records").await?;
    let data: Vec<LeaveRecord> = filter
        .fetch_page(
            pool.get_ref(),
            &format!("SELECT {LEAVE_COLUMNS} FROM leave_records"),
            "start_date DESC",
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
