use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use serde_json::{Map, Value};

use super::role::Role;
use crate::error::{AppError, AppResult};

/// Public projection of a user row. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 7,
    "name": "Jane Doe",
    "email": "jane@company.com",
    "role": "employee",
    "division": "engineering",
    "department": "platform",
    "phone": "+8801712345678",
    "address": null,
    "leaveBalance": 9,
    "performanceScore": 4.2
}))]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub division: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub leave_balance: i32,
    pub performance_score: f64,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: NaiveDateTime,
}

pub const USER_COLUMNS: &str = "id, name, email, role, division, department, phone, address, \
     leave_balance, performance_score, created_at, updated_at";

/// Row used only by login.
#[derive(sqlx::FromRow)]
pub struct UserCredentials {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Fields an owner may change on their own profile, directly or through a
/// change request. `role`, `email` and `password` are never in this list.
pub const SELF_EDITABLE_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("phone", "phone"),
    ("address", "address"),
    ("division", "division"),
    ("department", "department"),
];

/// Fields a manager/owner may change on any user.
pub const ADMIN_EDITABLE_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("phone", "phone"),
    ("address", "address"),
    ("division", "division"),
    ("department", "department"),
    ("role", "role"),
    ("leaveBalance", "leave_balance"),
    ("performanceScore", "performance_score"),
];

/// Editable keys whose columns are `NOT NULL`.
pub const REQUIRED_FIELDS: &[&str] = &["name"];

/// Rejects `null` or blank values for required fields in a change set.
pub fn check_required_values(changes: &Map<String, Value>) -> AppResult<()> {
    for key in REQUIRED_FIELDS {
        match changes.get(*key) {
            None => {}
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(_) => return Err(AppError::invalid(format!("{key} cannot be empty"))),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn name_must_stay_present() {
        assert!(check_required_values(&obj(json!({"name": "Jane"}))).is_ok());
        assert!(check_required_values(&obj(json!({"phone": null}))).is_ok());

        for bad in [json!({"name": null}), json!({"name": "   "}), json!({"name": 3})] {
            assert!(matches!(
                check_required_values(&obj(bad)),
                Err(AppError::InvalidInput(_))
            ));
        }
    }
}
