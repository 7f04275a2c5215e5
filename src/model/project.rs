use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Archived,
}

super::sql_text_enum!(ProjectStatus);

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "name": "Payroll revamp",
    "code": "PRJ-001",
    "description": null,
    "status": "active"
}))]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: NaiveDateTime,
}

pub const PROJECT_COLUMNS: &str = "id, name, code, description, status, created_at, updated_at";
