//! pending → approved | rejected transitions for attendance records,
//! permissions and profile change requests.

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::auth::policy::Resource;
use crate::error::{AppError, AppResult};
use crate::model::user::SELF_EDITABLE_FIELDS;
use crate::utils::db_utils::{build_update_sql, execute_update};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Rejected,
}

impl Verdict {
    pub fn as_status(self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reviewable {
    Attendance,
    Permission,
    ProfileRequest,
}

impl Reviewable {
    fn table(self) -> &'static str {
        match self {
            Reviewable::Attendance => "attendance_records",
            Reviewable::Permission => "permissions",
            Reviewable::ProfileRequest => "profile_change_requests",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Reviewable::Attendance => "Attendance record",
            Reviewable::Permission => "Permission",
            Reviewable::ProfileRequest => "Profile change request",
        }
    }

    pub fn resource(self) -> Resource {
        match self {
            Reviewable::Attendance => Resource::Attendance,
            Reviewable::Permission => Resource::Permission,
            Reviewable::ProfileRequest => Resource::ProfileRequest,
        }
    }
}

/// Only `pending` entities can be decided; decided ones are terminal.
pub fn ensure_pending(kind: Reviewable, current: &str) -> AppResult<()> {
    if current == "pending" {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "{} is not pending (status: {current})",
            kind.label()
        )))
    }
}

/// Settles a reviewable entity. The caller has already passed the `Review`
/// authorization check. Approving a profile change request also applies its
/// diff to the user, inside the same transaction.
#[instrument(skip(pool, notes))]
pub async fn decide(
    pool: &MySqlPool,
    kind: Reviewable,
    id: u64,
    reviewer_id: u64,
    verdict: Verdict,
    notes: Option<&str>,
    now: NaiveDateTime,
) -> AppResult<()> {
    let table = kind.table();
    let mut tx = pool.begin().await?;

    let current: Option<(String, u64)> = sqlx::query_as(&format!(
        "SELECT status, user_id FROM {table} WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let (status, owner_id) =
        current.ok_or_else(|| AppError::not_found(format!("{} not found", kind.label())))?;

    ensure_pending(kind, &status)?;

    sqlx::query(&format!(
        r#"
        UPDATE {table}
        SET status = ?, decided_by = ?, decided_at = ?, decision_notes = ?
        WHERE id = ?
        "#
    ))
    .bind(verdict.as_status())
    .bind(reviewer_id)
    .bind(now)
    .bind(notes)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if kind == Reviewable::ProfileRequest && verdict == Verdict::Approved {
        let (changes,): (Json<Map<String, Value>>,) =
            sqlx::query_as("SELECT changes FROM profile_change_requests WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if !changes.0.is_empty() {
            let update = build_update_sql("users", &changes.0, SELF_EDITABLE_FIELDS, "id", owner_id)?;
            execute_update(&mut *tx, update).await?;
        }
    }

    tx.commit().await?;

    info!(
        id,
        reviewer_id,
        owner_id,
        kind = kind.label(),
        status = verdict.as_status(),
        "Review decided"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_test_user;
    use crate::model::role::Role;

    #[test]
    fn pending_entities_can_be_decided() {
        assert!(ensure_pending(Reviewable::Permission, "pending").is_ok());
    }

    #[test]
    fn decided_entities_are_terminal() {
        for status in ["approved", "rejected"] {
            let err = ensure_pending(Reviewable::Permission, status).unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
        }
        let err = ensure_pending(Reviewable::ProfileRequest, "approved").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Profile change request is not pending (status: approved)"
        );
    }

    #[test]
    fn valid_attendance_has_nothing_to_review() {
        assert!(ensure_pending(Reviewable::Attendance, "valid").is_err());
    }

    #[test]
    fn verdict_deserializes_from_status_strings() {
        let v: Verdict = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(v, Verdict::Approved);
        assert_eq!(Verdict::Rejected.as_status(), "rejected");
        assert!(serde_json::from_str::<Verdict>("\"pending\"").is_err());
    }

    #[test]
    fn each_kind_is_guarded_by_its_own_resource() {
        assert_eq!(Reviewable::Attendance.resource(), Resource::Attendance);
        assert_eq!(Reviewable::Permission.resource(), Resource::Permission);
        assert_eq!(Reviewable::ProfileRequest.resource(), Resource::ProfileRequest);
    }

    fn noon() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn second_decision_conflicts_and_keeps_the_first(pool: MySqlPool) {
        let employee = insert_test_user(&pool, "eve@company.com", Role::Employee, None).await;
        let first = insert_test_user(&pool, "mia@company.com", Role::Manager, None).await;
        let second = insert_test_user(&pool, "olu@company.com", Role::Owner, None).await;
        let id = sqlx::query("INSERT INTO permissions (user_id, kind, note) VALUES (?, 'late', 'bus')")
            .bind(employee)
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_id();

        decide(&pool, Reviewable::Permission, id, first, Verdict::Approved, Some("ok"), noon())
            .await
            .unwrap();
        let again = decide(&pool, Reviewable::Permission, id, second, Verdict::Rejected, None, noon()).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let (status, decided_by, notes): (String, Option<u64>, Option<String>) =
            sqlx::query_as("SELECT status, decided_by, decision_notes FROM permissions WHERE id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "approved");
        assert_eq!(decided_by, Some(first));
        assert_eq!(notes.as_deref(), Some("ok"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn approving_a_profile_request_applies_the_diff(pool: MySqlPool) {
        let employee = insert_test_user(&pool, "fay@company.com", Role::Employee, None).await;
        let manager = insert_test_user(&pool, "gus@company.com", Role::Manager, None).await;
        let id = sqlx::query("INSERT INTO profile_change_requests (user_id, changes) VALUES (?, ?)")
            .bind(employee)
            .bind(Json(serde_json::json!({"phone": "555-0101"})))
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_id();

        decide(&pool, Reviewable::ProfileRequest, id, manager, Verdict::Approved, None, noon())
            .await
            .unwrap();

        let phone: Option<String> = sqlx::query_scalar("SELECT phone FROM users WHERE id = ?")
            .bind(employee)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(phone.as_deref(), Some("555-0101"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deciding_a_missing_entity_is_not_found(pool: MySqlPool) {
        let result = decide(&pool, Reviewable::Attendance, 999, 1, Verdict::Approved, None, noon()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
