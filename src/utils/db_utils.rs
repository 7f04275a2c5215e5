use serde_json::{Map, Value};
use sqlx::MySql;

use crate::error::{AppError, AppResult};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// `allowed` maps JSON keys to column names; any other key is rejected, so
/// only compile-time column names ever reach the SQL text.
pub fn build_update_sql(
    table: &str,
    payload: &Map<String, Value>,
    allowed: &[(&str, &str)],
    id_column: &str,
    id_value: u64,
) -> AppResult<SqlUpdate> {
    if payload.is_empty() {
        return Err(AppError::invalid("No fields provided for update"));
    }

    let mut columns = Vec::with_capacity(payload.len());
    let mut values = Vec::with_capacity(payload.len() + 1);

    for (key, value) in payload {
        let column = allowed
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, c)| *c)
            .ok_or_else(|| AppError::invalid(format!("Unknown or read-only field: {key}")))?;

        columns.push(format!("{column} = ?"));

        // Convert JSON values → SqlValue
        values.push(match value {
            Value::String(s) => SqlValue::String(s.clone()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::F64(f)
                } else {
                    return Err(AppError::invalid(format!("Number out of range: {key}")));
                }
            }
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Null => SqlValue::Null,
            _ => return Err(AppError::invalid(format!("Unsupported value type: {key}"))),
        });
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        columns.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'c, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(executor).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[(&str, &str)] = &[("name", "name"), ("leaveBalance", "leave_balance")];

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn maps_json_keys_to_columns() {
        let update = build_update_sql(
            "users",
            &obj(json!({"leaveBalance": 4})),
            FIELDS,
            "id",
            9,
        )
        .unwrap();

        assert_eq!(update.sql, "UPDATE users SET leave_balance = ? WHERE id = ?");
        assert_eq!(update.values, vec![SqlValue::I64(4), SqlValue::U64(9)]);
    }

    #[test]
    fn rejects_fields_outside_the_allow_list() {
        let err = build_update_sql("users", &obj(json!({"role": "owner"})), FIELDS, "id", 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown or read-only field: role");
    }

    #[test]
    fn rejects_empty_and_nested_payloads() {
        assert!(build_update_sql("users", &Map::new(), FIELDS, "id", 1).is_err());
        assert!(build_update_sql("users", &obj(json!({"name": ["a"]})), FIELDS, "id", 1).is_err());
    }

    #[test]
    fn null_clears_a_column() {
        let update = build_update_sql("users", &obj(json!({"name": null})), FIELDS, "id", 1).unwrap();
        assert_eq!(update.values[0], SqlValue::Null);
    }
}
