use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::decision::Decision;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClockType {
    ClockIn,
    ClockOut,
}

super::sql_text_enum!(ClockType);

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Valid,
    Pending,
    Approved,
    Rejected,
}

super::sql_text_enum!(AttendanceStatus);

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub clock_type: ClockType,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "08:15:00", value_type = String)]
    pub time: NaiveTime,
    #[schema(format = "date-time", value_type = String)]
    pub timestamp: NaiveDateTime,
    pub photo_url: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_late: bool,
    pub late_duration: i32,
    pub is_early_leave: bool,
    pub early_leave_duration: i32,
    pub permission_id: Option<u64>,
    pub status: AttendanceStatus,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub decision: Decision,
}

pub const ATTENDANCE_COLUMNS: &str = "id, user_id, type, date, time, timestamp, photo_url, \
     location, latitude, longitude, is_late, late_duration, is_early_leave, early_leave_duration, \
     permission_id, status, decided_by, decided_at, decision_notes";
