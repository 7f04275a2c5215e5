use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

/// Shift policy for a division. A row with no division is the organization default.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkSetting {
    pub id: u64,
    #[schema(example = "engineering", nullable = true)]
    pub division: Option<String>,
    #[schema(example = "08:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "17:00:00", value_type = String)]
    pub end_time: NaiveTime,
    #[schema(example = 10)]
    pub grace_period_minutes: u32,
    #[schema(example = 100)]
    pub geofence_radius_meters: u32,
    #[schema(example = 0.5)]
    pub late_deduction_rate: f64,
    #[schema(example = 0.5)]
    pub early_leave_deduction_rate: f64,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: NaiveDateTime,
}

pub const EDITABLE_FIELDS: &[(&str, &str)] = &[
    ("division", "division"),
    ("startTime", "start_time"),
    ("endTime", "end_time"),
    ("gracePeriodMinutes", "grace_period_minutes"),
    ("geofenceRadiusMeters", "geofence_radius_meters"),
    ("lateDeductionRate", "late_deduction_rate"),
    ("earlyLeaveDeductionRate", "early_leave_deduction_rate"),
];
