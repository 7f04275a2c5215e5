pub mod attendance;
pub mod leave;
pub mod permission;
pub mod profile_request;
pub mod project;
pub mod timesheet;
pub mod user;
pub mod work_setting;

use actix_web::web;
use chrono::{Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::auth::policy::Action;
use crate::engine::approval::{self, Reviewable, Verdict};
use crate::error::{AppError, AppResult};

/// Server wall clock; client-supplied times are never trusted for stamping.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// 1-based page number and page size, capped at 100.
pub fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, (page - 1) * per_page)
}

/// Optional reviewer notes on approve/reject.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReviewNotes {
    #[schema(example = "Verified with the team lead")]
    pub notes: Option<String>,
}

/// Body that may be omitted entirely. An empty body yields the defaults; a
/// present one must be valid JSON for `T`.
pub fn optional_json<T: DeserializeOwned + Default>(body: &web::Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::invalid(format!("Invalid JSON body: {e}")))
}

/// Authorizes then settles a reviewable entity.
pub async fn review(
    pool: &MySqlPool,
    auth: &AuthUser,
    kind: Reviewable,
    id: u64,
    verdict: Verdict,
    notes: Option<&str>,
) -> AppResult<()> {
    auth.require(Action::Review, kind.resource())?;
    approval::decide(pool, kind, id, auth.user_id, verdict, notes, now()).await
}

/// Dynamic WHERE clause with typed binds, shared by the list endpoints.
#[derive(Default)]
pub struct Filter {
    clauses: Vec<&'static str>,
    args: Vec<FilterValue>,
}

pub enum FilterValue {
    U64(u64),
    Str(String),
    Date(chrono::NaiveDate),
}

impl Filter {
    pub fn push(&mut self, clause: &'static str, value: FilterValue) {
        self.clauses.push(clause);
        self.args.push(value);
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub async fn count(&self, pool: &MySqlPool, table: &str) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", table, self.where_sql());
        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        for arg in &self.args {
            q = match arg {
                FilterValue::U64(v) => q.bind(*v),
                FilterValue::Str(s) => q.bind(s.as_str()),
                FilterValue::Date(d) => q.bind(*d),
            };
        }
        q.fetch_one(pool).await
    }

    pub async fn fetch_page<T>(
        &self,
        pool: &MySqlPool,
        select: &str,
        order_by: &str,
        per_page: u32,
        offset: u32,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> + Send + Unpin,
    {
        let sql = format!(
            "{}{} ORDER BY {} LIMIT ? OFFSET ?",
            select,
            self.where_sql(),
            order_by
        );
        let mut q = sqlx::query_as::<_, T>(&sql);
        for arg in &self.args {
            q = match arg {
                FilterValue::U64(v) => q.bind(*v),
                FilterValue::Str(s) => q.bind(s.as_str()),
                FilterValue::Date(d) => q.bind(*d),
            };
        }
        q.bind(per_page).bind(offset).fetch_all(pool).await
    }
}
