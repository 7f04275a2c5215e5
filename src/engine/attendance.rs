//! Clock-in/clock-out evaluation and recording.

use chrono::{NaiveDateTime, NaiveTime};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult, is_unique_violation};
use crate::model::attendance::{ATTENDANCE_COLUMNS, AttendanceRecord, AttendanceStatus, ClockType};
use crate::model::permission::{PermissionKind, check_duration};
use crate::model::work_setting::WorkSetting;

/// Shift boundaries used to judge a clock event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub grace_minutes: u32,
}

impl From<&WorkSetting> for Shift {
    fn from(ws: &WorkSetting) -> Self {
        Self {
            start: ws.start_time,
            end: ws.end_time,
            grace_minutes: ws.grace_period_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockOutcome {
    pub is_late: bool,
    /// Minutes past `start + grace`, never negative.
    pub late_duration: i32,
    pub is_early_leave: bool,
    /// Minutes before `end`, never negative.
    pub early_leave_duration: i32,
}

impl ClockOutcome {
    pub fn flagged(&self) -> bool {
        self.is_late || self.is_early_leave
    }
}

/// Judges a clock event against a shift. Without a shift nothing is flagged.
pub fn evaluate(clock_type: ClockType, at: NaiveTime, shift: Option<&Shift>) -> ClockOutcome {
    let Some(shift) = shift else {
        return ClockOutcome::default();
    };

    match clock_type {
        ClockType::ClockIn => {
            let (tolerance, wrapped) = shift
                .start
                .overflowing_add_signed(chrono::Duration::minutes(shift.grace_minutes as i64));
            // grace runs past midnight, so nothing later today is late
            if wrapped != 0 {
                return ClockOutcome::default();
            }
            let late_by = (at - tolerance).num_minutes().max(0) as i32;
            ClockOutcome {
                is_late: at > tolerance,
                late_duration: late_by,
                ..Default::default()
            }
        }
        ClockType::ClockOut => {
            let early_by = (shift.end - at).num_minutes().max(0) as i32;
            ClockOutcome {
                is_early_leave: at < shift.end,
                early_leave_duration: early_by,
                ..Default::default()
            }
        }
    }
}

pub fn initial_status(outcome: &ClockOutcome, has_permission: bool) -> AttendanceStatus {
    if has_permission || outcome.flagged() {
        AttendanceStatus::Pending
    } else {
        AttendanceStatus::Valid
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct Coordinates {
    #[schema(example = 23.8103)]
    pub latitude: f64,
    #[schema(example = 90.4125)]
    pub longitude: f64,
}

/// Justification attached to a clock event.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionInput {
    #[schema(example = "late")]
    pub kind: Option<PermissionKind>,
    #[schema(example = "Traffic jam")]
    pub note: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    #[schema(example = 15)]
    pub duration: Option<i32>,
}

fn non_blank(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl PermissionInput {
    /// True when the caller actually supplied a justification.
    pub fn is_supplied(&self) -> bool {
        non_blank(&self.note)
            || non_blank(&self.description)
            || non_blank(&self.file_url)
            || self.duration.is_some()
    }

    pub fn validate(&self) -> AppResult<()> {
        check_duration(self.duration)
    }

    pub fn resolved_kind(&self, clock_type: ClockType) -> PermissionKind {
        self.kind.unwrap_or(match clock_type {
            ClockType::ClockIn => PermissionKind::Late,
            ClockType::ClockOut => PermissionKind::EarlyLeave,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClockRequest {
    /// `clock_in` or `clock_out`
    #[serde(rename = "type")]
    #[schema(example = "clock_in")]
    pub clock_type: String,
    pub photo_url: Option<String>,
    #[schema(example = "Head office")]
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub permission: Option<PermissionInput>,
}

impl ClockRequest {
    pub fn parsed_type(&self) -> AppResult<ClockType> {
        self.clock_type
            .trim()
            .parse()
            .map_err(|_| AppError::invalid("type must be clock_in or clock_out"))
    }
}

/// Picks the user's division setting, falling back to the organization default.
async fn resolve_work_setting(pool: &MySqlPool, user_id: u64) -> AppResult<Option<WorkSetting>> {
    let setting = sqlx::query_as::<_, WorkSetting>(
        r#"
        SELECT ws.*
        FROM work_settings ws
        JOIN users u ON u.id = ?
        WHERE ws.division = u.division OR ws.division IS NULL
        ORDER BY ws.division IS NULL
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(setting)
}

/// Records a clock event for `user_id` at `now` (server wall clock). The
/// permission, if any, and the attendance row are written in one transaction.
#[instrument(skip(pool, request), fields(clock_type = %request.clock_type))]
pub async fn record_clock(
    pool: &MySqlPool,
    user_id: u64,
    request: &ClockRequest,
    now: NaiveDateTime,
) -> AppResult<AttendanceRecord> {
    let clock_type = request.parsed_type()?;

    let setting = resolve_work_setting(pool, user_id).await?;
    let shift = setting.as_ref().map(Shift::from);
    let outcome = evaluate(clock_type, now.time(), shift.as_ref());

    let permission = request.permission.as_ref().filter(|p| p.is_supplied());
    if let Some(p) = permission {
        p.validate()?;
    }

    let mut tx = pool.begin().await?;

    let permission_id = match permission {
        Some(p) => {
            let result = sqlx::query(
                r#"
                INSERT INTO permissions
                    (user_id, kind, note, description, file_url, duration_minutes, status)
                VALUES (?, ?, ?, ?, ?, ?, 'pending')
                "#,
            )
            .bind(user_id)
            .bind(p.resolved_kind(clock_type))
            .bind(&p.note)
            .bind(&p.description)
            .bind(&p.file_url)
            .bind(p.duration)
            .execute(&mut *tx)
            .await?;
            Some(result.last_insert_id())
        }
        None => None,
    };

    let status = initial_status(&outcome, permission_id.is_some());

    let inserted = sqlx::query(
        r#"
        INSERT INTO attendance_records
            (user_id, type, date, time, timestamp, photo_url, location, latitude, longitude,
             is_late, late_duration, is_early_leave, early_leave_duration, permission_id, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(clock_type)
    .bind(now.date())
    .bind(now.time())
    .bind(now)
    .bind(&request.photo_url)
    .bind(&request.location)
    .bind(request.coordinates.map(|c| c.latitude))
    .bind(request.coordinates.map(|c| c.longitude))
    .bind(outcome.is_late)
    .bind(outcome.late_duration)
    .bind(outcome.is_early_leave)
    .bind(outcome.early_leave_duration)
    .bind(permission_id)
    .bind(status)
    .execute(&mut *tx)
    .await;

    // dropping `tx` on the error path rolls back the permission insert
    let record_id = match inserted {
        Ok(r) => r.last_insert_id(),
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict(match clock_type {
                ClockType::ClockIn => "Already clocked in today".into(),
                ClockType::ClockOut => "Already clocked out today".into(),
            }));
        }
        Err(e) => return Err(e.into()),
    };

    let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records WHERE id = ?"
    ))
    .bind(record_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        user_id,
        record_id,
        status = %record.status,
        is_late = outcome.is_late,
        is_early_leave = outcome.is_early_leave,
        ?permission_id,
        "Clock event recorded"
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_test_user;
    use crate::model::role::Role;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn shift() -> Shift {
        Shift {
            start: t(8, 0),
            end: t(17, 0),
            grace_minutes: 10,
        }
    }

    #[test]
    fn clock_in_after_grace_is_late_by_the_overshoot() {
        let outcome = evaluate(ClockType::ClockIn, t(8, 15), Some(&shift()));
        assert!(outcome.is_late);
        assert_eq!(outcome.late_duration, 5);
        assert!(!outcome.is_early_leave);
    }

    #[test]
    fn clock_in_within_grace_is_on_time() {
        for at in [t(7, 30), t(8, 0), t(8, 10)] {
            let outcome = evaluate(ClockType::ClockIn, at, Some(&shift()));
            assert!(!outcome.is_late, "{at}");
            assert_eq!(outcome.late_duration, 0);
        }
    }

    #[test]
    fn clock_out_before_end_is_early_leave() {
        let outcome = evaluate(ClockType::ClockOut, t(16, 20), Some(&shift()));
        assert!(outcome.is_early_leave);
        assert_eq!(outcome.early_leave_duration, 40);
        assert!(!outcome.is_late);

        let on_time = evaluate(ClockType::ClockOut, t(17, 5), Some(&shift()));
        assert_eq!(on_time, ClockOutcome::default());
    }

    #[test]
    fn grace_past_midnight_does_not_wrap() {
        let night = Shift {
            start: t(23, 50),
            end: t(23, 59),
            grace_minutes: 20,
        };
        let outcome = evaluate(ClockType::ClockIn, t(23, 55), Some(&night));
        assert!(!outcome.is_late);
        assert_eq!(outcome.late_duration, 0);
    }

    #[test]
    fn negative_permission_duration_is_rejected() {
        let input = PermissionInput {
            duration: Some(-45),
            ..Default::default()
        };
        assert!(input.is_supplied());
        assert!(matches!(input.validate(), Err(AppError::InvalidInput(_))));

        let ok = PermissionInput {
            duration: Some(0),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn no_shift_means_no_flags() {
        assert_eq!(
            evaluate(ClockType::ClockIn, t(11, 0), None),
            ClockOutcome::default()
        );
    }

    #[test]
    fn status_is_valid_only_without_permission_or_flags() {
        let clean = ClockOutcome::default();
        assert_eq!(initial_status(&clean, false), AttendanceStatus::Valid);
        assert_eq!(initial_status(&clean, true), AttendanceStatus::Pending);

        let late = evaluate(ClockType::ClockIn, t(9, 0), Some(&shift()));
        assert_eq!(initial_status(&late, false), AttendanceStatus::Pending);
    }

    #[test]
    fn permission_kind_follows_clock_type_unless_given() {
        let input = PermissionInput {
            note: Some("bus broke down".into()),
            ..Default::default()
        };
        assert!(input.is_supplied());
        assert_eq!(input.resolved_kind(ClockType::ClockIn), PermissionKind::Late);
        assert_eq!(
            input.resolved_kind(ClockType::ClockOut),
            PermissionKind::EarlyLeave
        );

        let explicit = PermissionInput {
            kind: Some(PermissionKind::Other),
            ..input
        };
        assert_eq!(explicit.resolved_kind(ClockType::ClockIn), PermissionKind::Other);
    }

    #[test]
    fn blank_justification_is_not_a_permission() {
        let input = PermissionInput {
            note: Some("   ".into()),
            ..Default::default()
        };
        assert!(!input.is_supplied());

        let with_duration = PermissionInput {
            duration: Some(30),
            ..Default::default()
        };
        assert!(with_duration.is_supplied());
    }

    #[test]
    fn clock_type_must_be_exact() {
        let parse = |s: &str| {
            ClockRequest {
                clock_type: s.into(),
                photo_url: None,
                location: None,
                coordinates: None,
                permission: None,
            }
            .parsed_type()
        };
        assert_eq!(parse("clock_in").unwrap(), ClockType::ClockIn);
        assert_eq!(parse("clock_out").unwrap(), ClockType::ClockOut);
        assert!(matches!(parse("clockin"), Err(AppError::InvalidInput(_))));
        assert!(parse("").is_err());
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_time(t(h, m))
    }

    fn clock_in_with_note() -> ClockRequest {
        ClockRequest {
            clock_type: "clock_in".into(),
            photo_url: None,
            location: Some("Head office".into()),
            coordinates: None,
            permission: Some(PermissionInput {
                note: Some("Traffic jam".into()),
                ..Default::default()
            }),
        }
    }

    async fn permission_count(pool: &MySqlPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM permissions")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn late_clock_in_links_its_permission(pool: MySqlPool) {
        let user_id = insert_test_user(&pool, "ana@company.com", Role::Employee, Some("ops")).await;
        sqlx::query(
            "INSERT INTO work_settings (division, start_time, end_time, grace_period_minutes) \
             VALUES ('ops', '08:00:00', '17:00:00', 10)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let record = record_clock(&pool, user_id, &clock_in_with_note(), at(8, 30))
            .await
            .unwrap();

        assert!(record.is_late);
        assert_eq!(record.late_duration, 20);
        assert_eq!(record.status, AttendanceStatus::Pending);

        let permission_id = record.permission_id.expect("permission linked");
        let (owner, kind, note): (u64, String, Option<String>) =
            sqlx::query_as("SELECT user_id, kind, note FROM permissions WHERE id = ?")
                .bind(permission_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(owner, user_id);
        assert_eq!(kind, "late");
        assert_eq!(note.as_deref(), Some("Traffic jam"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_clock_leaves_no_orphan_permission(pool: MySqlPool) {
        let user_id = insert_test_user(&pool, "ben@company.com", Role::Employee, None).await;

        record_clock(&pool, user_id, &clock_in_with_note(), at(8, 0))
            .await
            .unwrap();
        let second = record_clock(&pool, user_id, &clock_in_with_note(), at(8, 5)).await;

        assert!(matches!(second, Err(AppError::Conflict(ref m)) if m == "Already clocked in today"));
        assert_eq!(permission_count(&pool).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn division_setting_wins_over_default(pool: MySqlPool) {
        let user_id = insert_test_user(&pool, "cy@company.com", Role::Employee, Some("ops")).await;
        sqlx::query(
            "INSERT INTO work_settings (division, start_time, end_time, grace_period_minutes) \
             VALUES (NULL, '09:00:00', '18:00:00', 0), ('ops', '07:00:00', '16:00:00', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let setting = resolve_work_setting(&pool, user_id).await.unwrap().unwrap();
        assert_eq!(setting.division.as_deref(), Some("ops"));

        let other = insert_test_user(&pool, "dee@company.com", Role::Employee, Some("sales")).await;
        let fallback = resolve_work_setting(&pool, other).await.unwrap().unwrap();
        assert!(fallback.division.is_none());
    }
}
