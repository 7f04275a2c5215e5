use crate::api::{Filter, FilterValue, Paginated, page_window};
use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::auth::policy::{Action, Resource};
use crate::error::{AppError, AppResult, is_unique_violation};
use crate::model::role::Role;
use crate::model::user::{
    ADMIN_EDITABLE_FIELDS, SELF_EDITABLE_FIELDS, USER_COLUMNS, User, check_required_values,
};
use crate::utils::db_utils::{build_update_sql, execute_update};
use crate::utils::{email_cache, email_filter};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const EMAIL_TAKEN: &str = "Email already registered";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    #[schema(example = "changeme123")]
    pub password: String,
    #[schema(example = "employee")]
    pub role: Option<Role>,
    pub division: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>, example = "employee")]
    pub role: Option<Role>,
    pub division: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// true => email is free to register.
///
/// The cuckoo filter gives a fast negative, the cache a fast positive, and
/// the database settles everything else.
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> AppResult<bool> {
    let email = email_filter::normalize(email);

    if !email_filter::might_exist(&email) {
        return Ok(true);
    }

    if email_cache::is_taken(&email).await {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(&email)
    .fetch_one(pool)
    .await?;

    if exists {
        email_cache::mark_taken(&email).await;
    }

    Ok(!exists)
}

/// Field set the caller may PATCH on `target_id`, after checking role changes
/// and value types.
fn allowed_fields(
    auth: &AuthUser,
    target_id: u64,
    changes: &Map<String, Value>,
) -> AppResult<&'static [(&'static str, &'static str)]> {
    let fields = if target_id == auth.user_id && !changes.contains_key("role") {
        auth.require(Action::Update, Resource::User)?;
        SELF_EDITABLE_FIELDS
    } else {
        auth.require(Action::UpdateAny, Resource::User)?;
        ADMIN_EDITABLE_FIELDS
    };

    if let Some(role) = changes.get("role") {
        auth.require(Action::AssignRole, Resource::User)?;
        let role = role
            .as_str()
            .and_then(|r| Role::from_str(r).ok())
            .ok_or_else(|| AppError::invalid("role must be one of employee, supervisor, manager, owner, hr"))?;
        if role == Role::Owner && auth.role != Role::Owner {
            return Err(AppError::forbidden("Only an owner can grant the owner role"));
        }
    }

    if changes.get("leaveBalance").is_some_and(|v| v.as_i64().is_none()) {
        return Err(AppError::invalid("leaveBalance must be an integer"));
    }
    if changes
        .get("performanceScore")
        .is_some_and(|v| v.as_f64().is_none())
    {
        return Err(AppError::invalid("performanceScore must be a number"));
    }
    check_required_values(changes)?;

    Ok(fields)
}

async fn fetch_user(pool: &MySqlPool, id: u64) -> AppResult<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// List users
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated users", body = [User]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserQuery>,
) -> AppResult<impl Responder> {
    auth.require(Action::ReadAll, Resource::User)?;

    let mut filter = Filter::default();
    if let Some(role) = query.role {
        filter.push("role = ?", FilterValue::Str(role.to_string()));
    }
    if let Some(division) = &query.division {
        filter.push("division = ?", FilterValue::Str(division.clone()));
    }

    let (page, per_page, offset) = page_window(query.page, query.per_page);
    let total = filter.count(pool.get_ref(), "users").await?;
    let data: Vec<User> = filter
        .fetch_page(
            pool.get_ref(),
            &format!("SELECT {USER_COLUMNS} FROM users"),
            "name ASC",
            per_page,
            offset,
        )
        .await?;

    Ok(HttpResponse::Ok().json(Paginated {
        data,
        page,
        per_page,
        total,
    }))
}

/// Caller's own profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<impl Responder> {
    auth.require(Action::Read, Resource::User)?;
    Ok(HttpResponse::Ok().json(fetch_user(pool.get_ref(), auth.user_id).await?))
}

/// Get a user by id (self, or anyone for privileged roles)
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    auth.require(Action::Read, Resource::User)?;
    let id = auth.target_user(Some(path.into_inner()), Action::ReadAll, Resource::User)?;
    Ok(HttpResponse::Ok().json(fetch_user(pool.get_ref(), id).await?))
}

/// Create a user account (manager/owner)
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Missing fields or email already registered"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> AppResult<impl Responder> {
    auth.require(Action::Create, Resource::User)?;

    let name = payload.name.trim();
    let email = email_filter::normalize(&payload.email);
    if name.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(AppError::invalid("name, email and password are required"));
    }
    if !email.contains('@') {
        return Err(AppError::invalid("email is not valid"));
    }

    let role = payload.role.unwrap_or(Role::Employee);
    if role != Role::Employee {
        auth.require(Action::AssignRole, Resource::User)?;
    }
    if role == Role::Owner && auth.role != Role::Owner {
        return Err(AppError::forbidden("Only an owner can grant the owner role"));
    }

    if !is_email_available(&email, pool.get_ref()).await? {
        return Err(AppError::AlreadyExists(EMAIL_TAKEN.into()));
    }

    let hashed = hash_password(&payload.password).map_err(|e| {
        warn!(error = %e, "Password hashing failed");
        AppError::Internal("Failed to create user".into())
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password, role, division, department, phone, address)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(hashed)
    .bind(role)
    .bind(&payload.division)
    .bind(&payload.department)
    .bind(&payload.phone)
    .bind(&payload.address)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyExists(EMAIL_TAKEN.into())
        } else {
            e.into()
        }
    })?;

    email_filter::insert(&email);
    email_cache::mark_taken(&email).await;

    info!(email = %email, role = %role, created_by = auth.user_id, "User created");

    let user = fetch_user(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(user))
}

/// Partially update a user
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    request_body(content = Object, example = json!({"phone": "+8801711111111", "division": "sales"})),
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Map<String, Value>>,
) -> AppResult<impl Responder> {
    let id = path.into_inner();
    let changes = payload.into_inner();
    let fields = allowed_fields(&auth, id, &changes)?;

    let update = build_update_sql("users", &changes, fields, "id", id)?;
    if execute_update(pool.get_ref(), update).await? == 0 {
        // MySQL reports 0 for unchanged rows too, so confirm existence.
        fetch_user(pool.get_ref(), id).await?;
    }

    info!(user_id = id, updated_by = auth.user_id, fields = changes.len(), "User updated");
    Ok(HttpResponse::Ok().json(fetch_user(pool.get_ref(), id).await?))
}
