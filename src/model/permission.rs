use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

use super::decision::{ApprovalStatus, Decision};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PermissionKind {
    Late,
    EarlyLeave,
    Other,
}

super::sql_text_enum!(PermissionKind);

/// A justification request for a late arrival, early leave or other deviation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: u64,
    pub user_id: u64,
    pub kind: PermissionKind,
    pub note: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: ApprovalStatus,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub decision: Decision,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
}

pub const PERMISSION_COLUMNS: &str = "id, user_id, kind, note, description, file_url, \
     duration_minutes, status, decided_by, decided_at, decision_notes, created_at";

/// Permission duration in minutes, when given, cannot be negative.
pub fn check_duration(duration: Option<i32>) -> AppResult<()> {
    if duration.is_some_and(|d| d < 0) {
        return Err(AppError::invalid("duration cannot be negative"));
    }
    Ok(())
}
