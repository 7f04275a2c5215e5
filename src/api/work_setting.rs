use crate::api::Paginated;
use crate::auth::auth::AuthUser;
use crate::auth::policy::{Action, Resource};
use crate::error::{AppError, AppResult, is_unique_violation};
use crate::model::work_setting::{EDITABLE_FIELDS, WorkSetting};
use crate::utils::db_utils::{build_update_sql, execute_update};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const COLUMNS: &str = "id, division, start_time, end_time, grace_period_minutes, \
     geofence_radius_meters, late_deduction_rate, early_leave_deduction_rate, created_at, updated_at";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkSetting {
    /// Omit for the organization-wide default
    #[schema(example = "engineering")]
    pub division: Option<String>,
    #[schema(example = "08:00")]
    pub start_time: String,
    #[schema(example = "17:00")]
    pub end_time: String,
    #[serde(default)]
    #[schema(example = 10)]
    pub grace_period_minutes: u32,
    #[schema(example = 100)]
    pub geofence_radius_meters: Option<u32>,
    #[serde(default)]
    pub late_deduction_rate: f64,
    #[serde(default)]
    pub early_leave_deduction_rate: f64,
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_shift_time(field: &str, value: &str) -> AppResult<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::invalid(format!("{field} must be HH:MM")))
}

fn check_window(start: NaiveTime, end: NaiveTime) -> AppResult<()> {
    if end <= start {
        return Err(AppError::invalid("endTime must be after startTime"));
    }
    Ok(())
}

fn check_rate(field: &str, rate: f64) -> AppResult<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(AppError::invalid(format!("{field} cannot be negative")));
    }
    Ok(())
}

/// Normalizes a PATCH body: times are re-rendered as `HH:MM:SS`, numeric
/// fields must be non-negative. Returns the shift window after the patch.
fn normalize_patch(
    changes: &mut Map<String, Value>,
    current: &WorkSetting,
) -> AppResult<(NaiveTime, NaiveTime)> {
    let mut window = (current.start_time, current.end_time);

    for (key, value) in changes.iter_mut() {
        match key.as_str() {
            "startTime" | "endTime" => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| AppError::invalid(format!("{key} must be HH:MM")))?;
                let time = parse_shift_time(key, raw)?;
                if key == "startTime" {
                    window.0 = time;
                } else {
                    window.1 = time;
                }
                *value = Value::String(time.format("%H:%M:%S").to_string());
            }
            "gracePeriodMinutes" | "geofenceRadiusMeters" => {
                if value.as_u64().is_none() {
                    return Err(AppError::invalid(format!("{key} must be a non-negative integer")));
                }
            }
            "lateDeductionRate" | "earlyLeaveDeductionRate" => {
                let rate = value
                    .as_f64()
                    .ok_or_else(|| AppError::invalid(format!("{key} must be a number")))?;
                check_rate(key, rate)?;
            }
            _ => {}
        }
    }

    check_window(window.0, window.1)?;
    Ok(window)
}

fn map_write_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::AlreadyExists("A work setting already exists for this division".into())
    } else {
        e.into()
    }
}

async fn fetch_setting(pool: &MySqlPool, id: u64) -> AppResult<WorkSetting> {
    sqlx::query_as::<_, WorkSetting>(&format!("SELECT {COLUMNS} FROM work_settings WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Work setting not found"))
}

/// List shift policies
#[utoipa::path(
    get,
    path = "/api/work-settings",
    responses(
        (status = 200, description = "All work settings", body = [WorkSetting]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkSetting"
)]
pub async fn list_work_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<impl Responder> {
    auth.require(Action::ReadAll, Resource::WorkSetting)?;

    let data = sqlx::query_as::<_, WorkSetting>(&format!(
        "SELECT {COLUMNS} FROM work_settings ORDER BY division IS NOT NULL, division"
    ))
    .fetch_all(pool.get_ref())
    .await?;

    let total = data.len() as i64;
    Ok(HttpResponse::Ok().json(Paginated {
        per_page: data.len() as u32,
        data,
        page: 1,
        total,
    }))
}

/// Create a shift policy (manager/owner)
#[utoipa::path(
    post,
    path = "/api/work-settings",
    request_body = CreateWorkSetting,
    responses(
        (status = 201, description = "Work setting created", body = WorkSetting),
        (status = 400, description = "Invalid times or duplicate division"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkSetting"
)]
pub async fn create_work_setting(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWorkSetting>,
) -> AppResult<impl Responder> {
    auth.require(Action::Create, Resource::WorkSetting)?;

    let start = parse_shift_time("startTime", &payload.start_time)?;
    let end = parse_shift_time("endTime", &payload.end_time)?;
    check_window(start, end)?;
    check_rate("lateDeductionRate", payload.late_deduction_rate)?;
    check_rate("earlyLeaveDeductionRate", payload.early_leave_deduction_rate)?;

    let division = payload
        .division
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let result = sqlx::query(
        r#"
        INSERT INTO work_settings
            (division, start_time, end_time, grace_period_minutes, geofence_radius_meters,
             late_deduction_rate, early_leave_deduction_rate)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(division)
    .bind(start)
    .bind(end)
    .bind(payload.grace_period_minutes)
    .bind(payload.geofence_radius_meters.unwrap_or(100))
    .bind(payload.late_deduction_rate)
    .bind(payload.early_leave_deduction_rate)
    .execute(pool.get_ref())
    .await
    .map_err(map_write_error)?;

    info!(division = division.unwrap_or("default"), "Work setting created");

    let setting = fetch_setting(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(setting))
}

/// Partially update a shift policy (manager/owner)
#[utoipa::path(
    patch,
    path = "/api/work-settings/{id}",
    params(("id" = u64, Path, description = "Work setting id")),
    request_body(content = Object, example = json!({"gracePeriodMinutes": 15, "endTime": "17:30"})),
    responses(
        (status = 200, description = "Work setting updated", body = WorkSetting),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Work setting not found")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkSetting"
)]
pub async fn update_work_setting(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Map<String, Value>>,
) -> AppResult<impl Responder> {
    auth.require(Action::UpdateAny, Resource::WorkSetting)?;
    let id = path.into_inner();
    let current = fetch_setting(pool.get_ref(), id).await?;

    let mut changes = payload.into_inner();
    normalize_patch(&mut changes, &current)?;

    let update = build_update_sql("work_settings", &changes, EDITABLE_FIELDS, "id", id)?;
    execute_update(pool.get_ref(), update)
        .await
        .map_err(map_write_error)?;

    info!(work_setting_id = id, updated_by = auth.user_id, "Work setting updated");
    Ok(HttpResponse::Ok().json(fetch_setting(pool.get_ref(), id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use serde_json::json;

    fn setting() -> WorkSetting {
        let now = Local::now().naive_local();
        WorkSetting {
            id: 1,
            division: None,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            grace_period_minutes: 10,
            geofence_radius_meters: 100,
            late_deduction_rate: 0.0,
            early_leave_deduction_rate: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn parses_both_time_formats() {
        let expected = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        assert_eq!(parse_shift_time("startTime", "08:30").unwrap(), expected);
        assert_eq!(parse_shift_time("startTime", "08:30:00").unwrap(), expected);
        assert!(parse_shift_time("startTime", "8.30am").is_err());
    }

    #[test]
    fn patch_times_are_normalized() {
        let mut changes = obj(json!({"endTime": "18:15"}));
        let (start, end) = normalize_patch(&mut changes, &setting()).unwrap();
        assert_eq!(start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(18, 15, 0).unwrap());
        assert_eq!(changes["endTime"], "18:15:00");
    }

    #[test]
    fn patch_rejects_inverted_window_against_current_row() {
        let mut changes = obj(json!({"startTime": "17:30"}));
        assert!(matches!(
            normalize_patch(&mut changes, &setting()),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn patch_rejects_negative_numbers() {
        let mut changes = obj(json!({"gracePeriodMinutes": -5}));
        assert!(normalize_patch(&mut changes, &setting()).is_err());

        let mut changes = obj(json!({"lateDeductionRate": -0.5}));
        assert!(normalize_patch(&mut changes, &setting()).is_err());
    }

    fn owner() -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "owner@company.com".into(),
            role: crate::model::role::Role::Owner,
        }
    }

    fn create(body: Value) -> web::Json<CreateWorkSetting> {
        web::Json(serde_json::from_value(body).unwrap())
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn only_one_organization_default(pool: MySqlPool) {
        let pool = web::Data::new(pool);
        let default = json!({"startTime": "08:00", "endTime": "17:00"});

        assert!(create_work_setting(owner(), pool.clone(), create(default.clone())).await.is_ok());

        // a blank division is the default too
        for body in [default, json!({"division": "  ", "startTime": "09:00", "endTime": "18:00"})] {
            let result = create_work_setting(owner(), pool.clone(), create(body)).await;
            assert!(matches!(result, Err(AppError::AlreadyExists(_))));
        }

        let engineering = json!({"division": "engineering", "startTime": "10:00", "endTime": "19:00"});
        assert!(create_work_setting(owner(), pool.clone(), create(engineering.clone())).await.is_ok());
        let again = create_work_setting(owner(), pool.clone(), create(engineering)).await;
        assert!(matches!(again, Err(AppError::AlreadyExists(_))));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM work_settings")
            .fetch_one(pool.get_ref())
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }
}
