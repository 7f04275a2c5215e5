use crate::api::{Filter, FilterValue, Paginated, page_window};
use crate::auth::auth::AuthUser;
use crate::auth::policy::{Action, Resource};
use crate::error::{AppError, AppResult, is_foreign_key_violation};
use crate::model::timesheet::{TIMESHEET_COLUMNS, TimeRange, Timesheet, TimesheetResponse};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimesheet {
    pub project_id: Option<u64>,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "09:00")]
    pub start_time: String,
    #[schema(example = "17:30")]
    pub end_time: String,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimesheet {
    pub project_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TimesheetQuery {
    pub user_id: Option<u64>,
    pub project_id: Option<u64>,
    /// Inclusive lower bound (YYYY-MM-DD)
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound (YYYY-MM-DD)
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn map_write_error(e: sqlx::Error) -> AppError {
    if is_foreign_key_violation(&e) {
        AppError::invalid("Project not found")
    } else {
        e.into()
    }
}

async fn fetch_timesheet(pool: &MySqlPool, id: u64) -> AppResult<Timesheet> {
    sqlx::query_as::<_, Timesheet>(&format!(
        "SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Timesheet not found"))
}

/// List timesheets with derived hours
#[utoipa::path(
    get,
    path = "/api/timesheets",
    params(TimesheetQuery),
    responses(
        (status = 200, description = "Paginated timesheets", body = [TimesheetResponse]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Timesheet"
)]
pub async fn list_timesheets(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TimesheetQuery>,
) -> AppResult<impl Responder> {
    let mut filter = Filter::default();

    if auth.can(Action::ReadAll, Resource::Timesheet) {
        if let Some(user_id) = query.user_id {
            filter.push("user_id = ?", FilterValue::U64(user_id));
        }
    } else {
        let user_id = auth.target_user(query.user_id, Action::ReadAll, Resource::Timesheet)?;
        filter.push("user_id = ?", FilterValue::U64(user_id));
    }

    if let Some(project_id) = query.project_id {
        filter.push("project_id = ?", FilterValue::U64(project_id));
    }
    if let Some(from) = query.from {
        filter.push("date >= ?", FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        filter.push("date <= ?", FilterValue::Date(to));
    }

    let (page, per_page, offset) = page_window(query.page, query.per_page);
    let total = filter.count(pool.get_ref(), "timesheets").await?;
    let rows: Vec<Timesheet> = filter
        .fetch_page(
            pool.get_ref(),
            &format!("SELECT {TIMESHEET_COLUMNS} FROM timesheets"),
            "date DESC, start_time DESC",
            per_page,
            offset,
        )
        .await?;

    Ok(HttpResponse::Ok().json(Paginated {
        data: rows.into_iter().map(TimesheetResponse::from).collect(),
        page,
        per_page,
        total,
    }))
}

/// Log worked time for the caller
#[utoipa::path(
    post,
    path = "/api/timesheets",
    request_body = CreateTimesheet,
    responses(
        (status = 201, description = "Timesheet created", body = TimesheetResponse),
        (status = 400, description = "Invalid times or unknown project")
    ),
    security(("bearer_auth" = [])),
    tag = "Timesheet"
)]
pub async fn create_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTimesheet>,
) -> AppResult<impl Responder> {
    auth.require(Action::Create, Resource::Timesheet)?;
    let range = TimeRange::parse(&payload.start_time, &payload.end_time)?;

    let result = sqlx::query(
        r#"
        INSERT INTO timesheets (user_id, project_id, date, start_time, end_time, description)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.project_id)
    .bind(payload.date)
    .bind(payload.start_time.trim())
    .bind(payload.end_time.trim())
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await
    .map_err(map_write_error)?;

    info!(user_id = auth.user_id, date = %payload.date, hours = range.hours(), "Timesheet logged");

    let timesheet = fetch_timesheet(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(TimesheetResponse::from(timesheet)))
}

/// Edit a timesheet (own, or any for manager/owner/hr)
#[utoipa::path(
    put,
    path = "/api/timesheets/{id}",
    params(("id" = u64, Path, description = "Timesheet id")),
    request_body = UpdateTimesheet,
    responses(
        (status = 200, description = "Timesheet updated", body = TimesheetResponse),
        (status = 400, description = "Invalid times or unknown project"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Timesheet not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Timesheet"
)]
pub async fn update_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTimesheet>,
) -> AppResult<impl Responder> {
    auth.require(Action::Update, Resource::Timesheet)?;
    let id = path.into_inner();
    let current = fetch_timesheet(pool.get_ref(), id).await?;

    if current.user_id != auth.user_id {
        auth.require(Action::UpdateAny, Resource::Timesheet)?;
    }

    let start_time = payload.start_time.as_deref().unwrap_or(&current.start_time);
    let end_time = payload.end_time.as_deref().unwrap_or(&current.end_time);
    TimeRange::parse(start_time, end_time)?;

    sqlx::query(
        r#"
        UPDATE timesheets
        SET project_id = ?, date = ?, start_time = ?, end_time = ?, description = ?
        WHERE id = ?
        "#,
    )
    .bind(payload.project_id.or(current.project_id))
    .bind(payload.date.unwrap_or(current.date))
    .bind(start_time.trim())
    .bind(end_time.trim())
    .bind(payload.description.as_ref().or(current.description.as_ref()))
    .bind(id)
    .execute(pool.get_ref())
    .await
    .map_err(map_write_error)?;

    let timesheet = fetch_timesheet(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(TimesheetResponse::from(timesheet)))
}
