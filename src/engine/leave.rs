//! Leave application and quota reconciliation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::leave::{LEAVE_COLUMNS, LeaveQuota, LeaveRecord, LeaveType};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyLeave {
    /// Defaults to the caller
    pub user_id: Option<u64>,
    #[serde(rename = "type")]
    #[schema(example = "annual")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = 2)]
    pub days: i64,
    pub note: Option<String>,
}

impl ApplyLeave {
    pub fn validate(&self) -> AppResult<u32> {
        if self.start_date > self.end_date {
            return Err(AppError::invalid("startDate cannot be after endDate"));
        }
        u32::try_from(self.days)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| AppError::invalid("days must be a positive number"))
    }
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub fn year_of(today: NaiveDate) -> Period {
    let year = today.year();
    Period {
        start: NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today),
        end: NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap_or(today),
    }
}

pub fn month_of(today: NaiveDate) -> Period {
    let start = today.with_day(1).unwrap_or(today);
    let end = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    };
    Period {
        start,
        end: end.unwrap_or(today),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Remaining {
    pub remaining_annual: u32,
    pub remaining_sick: u32,
}

/// Quota minus usage, floored at zero.
pub fn remaining(quota: &LeaveQuota, annual_used: u64, sick_used: u64) -> Remaining {
    let left = |allowance: u32, used: u64| u64::from(allowance).saturating_sub(used) as u32;
    Remaining {
        remaining_annual: left(quota.annual_leaves, annual_used),
        remaining_sick: left(quota.sick_leaves, sick_used),
    }
}

/// Reads the quota singleton, creating it with defaults on first use.
pub async fn load_quota<'c, E>(executor: E) -> AppResult<LeaveQuota>
where
    E: sqlx::Executor<'c, Database = MySql> + Copy,
{
    let defaults = LeaveQuota::default();
    sqlx::query("INSERT IGNORE INTO leave_quota (id, annual_leaves, sick_leaves) VALUES (1, ?, ?)")
        .bind(defaults.annual_leaves)
        .bind(defaults.sick_leaves)
        .execute(executor)
        .await?;

    let quota = sqlx::query_as::<_, LeaveQuota>(
        "SELECT annual_leaves, sick_leaves FROM leave_quota WHERE id = 1",
    )
    .fetch_one(executor)
    .await?;

    Ok(quota)
}

async fn approved_days(
    tx: &mut Transaction<'_, MySql>,
    user_id: u64,
    leave_type: LeaveType,
    period: Period,
) -> AppResult<u64> {
    let used: i64 = sqlx::query_scalar(
        r#"
        SELECT CAST(COALESCE(SUM(days), 0) AS SIGNED)
        FROM leave_records
        WHERE user_id = ? AND type = ? AND status = 'approved'
          AND start_date >= ? AND start_date < ?
        "#,
    )
    .bind(user_id)
    .bind(leave_type)
    .bind(period.start)
    .bind(period.end)
    .fetch_one(&mut **tx)
    .await?;

    Ok(used.max(0) as u64)
}

#[derive(Serialize, ToSchema)]
pub struct LeaveApplied {
    pub record: LeaveRecord,
    #[serde(flatten)]
    pub remaining: Remaining,
}

/// Records an approved leave and rewrites the user's remaining annual balance.
/// The user row is locked for the whole read-then-write.
#[instrument(skip(pool, request), fields(leave_type = %request.leave_type))]
pub async fn apply(
    pool: &MySqlPool,
    user_id: u64,
    request: &ApplyLeave,
    today: NaiveDate,
) -> AppResult<LeaveApplied> {
    let days = request.validate()?;
    let quota = load_quota(pool).await?;

    let mut tx = pool.begin().await?;

    let locked: Option<(u64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ? FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if locked.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO leave_records (user_id, type, start_date, end_date, days, note, status)
        VALUES (?, ?, ?, ?, ?, ?, 'approved')
        "#,
    )
    .bind(user_id)
    .bind(request.leave_type)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(days)
    .bind(&request.note)
    .execute(&mut *tx)
    .await?;

    let annual_used = approved_days(&mut tx, user_id, LeaveType::Annual, year_of(today)).await?;
    let sick_used = approved_days(&mut tx, user_id, LeaveType::Sick, month_of(today)).await?;
    let remaining = remaining(&quota, annual_used, sick_used);

    sqlx::query("UPDATE users SET leave_balance = ? WHERE id = ?")
        .bind(remaining.remaining_annual)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let record = sqlx::query_as::<_, LeaveRecord>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_records WHERE id = ?"
    ))
    .bind(inserted.last_insert_id())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        user_id,
        days,
        remaining_annual = remaining.remaining_annual,
        remaining_sick = remaining.remaining_sick,
        "Leave applied"
    );

    Ok(LeaveApplied { record, remaining })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_test_user;
    use crate::model::role::Role;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn request(start: NaiveDate, end: NaiveDate, days: i64) -> ApplyLeave {
        ApplyLeave {
            user_id: None,
            leave_type: LeaveType::Annual,
            start_date: start,
            end_date: end,
            days,
            note: None,
        }
    }

    #[test]
    fn remaining_is_quota_minus_usage() {
        let quota = LeaveQuota {
            annual_leaves: 12,
            sick_leaves: 2,
        };
        assert_eq!(
            remaining(&quota, 5, 1),
            Remaining {
                remaining_annual: 7,
                remaining_sick: 1
            }
        );
    }

    #[test]
    fn remaining_never_goes_negative() {
        let quota = LeaveQuota::default();
        let r = remaining(&quota, 40, 9);
        assert_eq!(r.remaining_annual, 0);
        assert_eq!(r.remaining_sick, 0);
    }

    #[test]
    fn periods_cover_calendar_year_and_month() {
        assert_eq!(
            year_of(d(2026, 7, 14)),
            Period {
                start: d(2026, 1, 1),
                end: d(2027, 1, 1)
            }
        );
        assert_eq!(
            month_of(d(2026, 2, 14)),
            Period {
                start: d(2026, 2, 1),
                end: d(2026, 3, 1)
            }
        );
        assert_eq!(
            month_of(d(2026, 12, 31)),
            Period {
                start: d(2026, 12, 1),
                end: d(2027, 1, 1)
            }
        );
    }

    #[test]
    fn validation_requires_ordered_dates_and_positive_days() {
        assert_eq!(request(d(2026, 3, 2), d(2026, 3, 3), 2).validate().unwrap(), 2);
        assert!(request(d(2026, 3, 4), d(2026, 3, 3), 1).validate().is_err());
        assert!(request(d(2026, 3, 2), d(2026, 3, 3), 0).validate().is_err());
        assert!(request(d(2026, 3, 2), d(2026, 3, 3), -3).validate().is_err());
    }

    #[test]
    fn leave_type_rejects_unknown_values() {
        let body = r#"{"type":"vacation","startDate":"2026-03-02","endDate":"2026-03-02","days":1}"#;
        assert!(serde_json::from_str::<ApplyLeave>(body).is_err());

        let ok = r#"{"type":"sick","startDate":"2026-03-02","endDate":"2026-03-02","days":1}"#;
        let parsed: ApplyLeave = serde_json::from_str(ok).unwrap();
        assert_eq!(parsed.leave_type, LeaveType::Sick);
    }

    async fn balance(pool: &MySqlPool, user_id: u64) -> i32 {
        sqlx::query_scalar("SELECT leave_balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn applying_rewrites_the_annual_balance(pool: MySqlPool) {
        let user_id = insert_test_user(&pool, "hal@company.com", Role::Employee, None).await;
        let today = d(2026, 3, 1);

        let first = apply(&pool, user_id, &request(d(2026, 3, 2), d(2026, 3, 4), 3), today)
            .await
            .unwrap();
        assert_eq!(first.remaining.remaining_annual, 9);
        assert_eq!(balance(&pool, user_id).await, 9);

        // last year's leave does not count against this year
        apply(&pool, user_id, &request(d(2025, 12, 29), d(2025, 12, 30), 2), today)
            .await
            .unwrap();
        let third = apply(&pool, user_id, &request(d(2026, 5, 4), d(2026, 5, 5), 2), today)
            .await
            .unwrap();
        assert_eq!(third.remaining.remaining_annual, 7);
        assert_eq!(third.remaining.remaining_sick, 2);
        assert_eq!(balance(&pool, user_id).await, 7);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn applying_for_an_unknown_user_is_not_found(pool: MySqlPool) {
        let result = apply(&pool, 424242, &request(d(2026, 3, 2), d(2026, 3, 2), 1), d(2026, 3, 1)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leave_records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(records, 0);
    }
}
