use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::decision::ApprovalStatus;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Other,
}

super::sql_text_enum!(LeaveType);

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRecord {
    pub id: u64,
    pub user_id: u64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub days: u32,
    pub note: Option<String>,
    pub status: ApprovalStatus,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
}

pub const LEAVE_COLUMNS: &str =
    "id, user_id, type, start_date, end_date, days, note, status, created_at";

/// Organization-wide allowances. Annual is per calendar year, sick per calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveQuota {
    #[schema(example = 12)]
    pub annual_leaves: u32,
    #[schema(example = 2)]
    pub sick_leaves: u32,
}

impl Default for LeaveQuota {
    fn default() -> Self {
        Self {
            annual_leaves: 12,
            sick_leaves: 2,
        }
    }
}
