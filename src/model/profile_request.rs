use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::types::Json;
use utoipa::ToSchema;

use super::decision::{ApprovalStatus, Decision};

/// A proposed partial update of a user's own profile. Only the diff is stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChangeRequest {
    pub id: u64,
    pub user_id: u64,
    #[schema(value_type = Object, example = json!({"phone": "+8801712345678"}))]
    pub changes: Json<Map<String, Value>>,
    pub status: ApprovalStatus,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub decision: Decision,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
}

pub const PROFILE_REQUEST_COLUMNS: &str =
    "id, user_id, changes, status, decided_by, decided_at, decision_notes, created_at";
