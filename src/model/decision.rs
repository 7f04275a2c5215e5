use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle of a permission or profile change request.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

super::sql_text_enum!(ApprovalStatus);

/// Who settled a reviewable entity, when, and why. Same shape for approval and
/// rejection across every reviewable entity.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub decided_by: Option<u64>,
    #[schema(example = "2026-01-01T09:30:00", format = "date-time", value_type = Option<String>)]
    pub decided_at: Option<NaiveDateTime>,
    pub decision_notes: Option<String>,
}
