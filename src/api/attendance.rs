use crate::api::{Filter, FilterValue, Paginated, now, page_window, review};
use crate::auth::auth::AuthUser;
use crate::auth::policy::{Action, Resource};
use crate::engine::approval::{Reviewable, Verdict};
use crate::engine::attendance::{ClockRequest, record_clock};
use crate::error::{AppError, AppResult};
use crate::model::attendance::{ATTENDANCE_COLUMNS, AttendanceRecord, AttendanceStatus};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Filter by user
    pub user_id: Option<u64>,
    /// Filter by date (YYYY-MM-DD)
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    /// Filter by status
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>)]
    pub status: Option<AttendanceStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewAttendance {
    #[schema(example = "approved")]
    pub status: Verdict,
    pub notes: Option<String>,
}

async fn fetch_record(pool: &MySqlPool, id: u64) -> AppResult<AttendanceRecord> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Attendance record not found"))
}

async fn list(
    pool: &MySqlPool,
    filter: Filter,
    page: Option<u32>,
    per_page: Option<u32>,
) -> AppResult<Paginated<AttendanceRecord>> {
    let (page, per_page, offset) = page_window(page, per_page);
    let total = filter.count(pool, "attendance_records").await?;
    let data = filter
        .fetch_page(
            pool,
            &format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance_records"),
            "timestamp DESC",
            per_page,
            offset,
        )
        .await?;

    Ok(Paginated {
        data,
        page,
        per_page,
        total,
    })
}

/// Clock in or out
#[utoipa::path(
    post,
    path = "/api/attendance/clock",
    request_body = ClockRequest,
    responses(
        (status = 200, description = "Clock event recorded", body = Object, example = json!({
            "success": true,
            "record": {"id": 1, "type": "clock_in", "isLate": true, "lateDuration": 5, "status": "pending"}
        })),
        (status = 400, description = "type must be clock_in or clock_out"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already clocked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ClockRequest>,
) -> AppResult<impl Responder> {
    auth.require(Action::Create, Resource::Attendance)?;

    let record = record_clock(pool.get_ref(), auth.user_id, &payload, now()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "record": record
    })))
}

/// Caller's own attendance history
#[utoipa::path(
    get,
    path = "/api/attendance/me",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance records", body = [AttendanceRecord]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> AppResult<impl Responder> {
    auth.require(Action::Read, Resource::Attendance)?;

    let mut filter = Filter::default();
    filter.push("user_id = ?", FilterValue::U64(auth.user_id));
    if let Some(date) = query.date {
        filter.push("date = ?", FilterValue::Date(date));
    }
    if let Some(status) = query.status {
        filter.push("status = ?", FilterValue::Str(status.to_string()));
    }

    let page = list(pool.get_ref(), filter, query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Attendance records across users
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance records", body = [AttendanceRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> AppResult<impl Responder> {
    auth.require(Action::ReadAll, Resource::Attendance)?;

    let mut filter = Filter::default();
    if let Some(user_id) = query.user_id {
        filter.push("user_id = ?", FilterValue::U64(user_id));
    }
    if let Some(date) = query.date {
        filter.push("date = ?", FilterValue::Date(date));
    }
    if let Some(status) = query.status {
        filter.push("status = ?", FilterValue::Str(status.to_string()));
    }

    let page = list(pool.get_ref(), filter, query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Approve or reject a pending attendance record (manager/owner)
#[utoipa::path(
    put,
    path = "/api/attendance/{id}/review",
    params(("id" = u64, Path, description = "Attendance record id")),
    request_body = ReviewAttendance,
    responses(
        (status = 200, description = "Record reviewed", body = AttendanceRecord),
        (status = 400, description = "Malformed id or status"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found"),
        (status = 409, description = "Record is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn review_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReviewAttendance>,
) -> AppResult<impl Responder> {
    let id = path.into_inner();

    review(
        pool.get_ref(),
        &auth,
        Reviewable::Attendance,
        id,
        payload.status,
        payload.notes.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(fetch_record(pool.get_ref(), id).await?))
}
