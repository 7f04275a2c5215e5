use crate::api::{Filter, FilterValue, Paginated, page_window};
use crate::auth::auth::AuthUser;
use crate::auth::policy::{Action, Resource};
use crate::error::{AppError, AppResult, is_foreign_key_violation, is_unique_violation};
use crate::model::project::{PROJECT_COLUMNS, Project, ProjectStatus};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const DUPLICATE_CODE: &str = "Project code must be unique";

#[derive(Deserialize, ToSchema)]
pub struct CreateProject {
    #[schema(example = "Payroll revamp")]
    pub name: String,
    #[schema(example = "PRJ-001")]
    pub code: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProjectQuery {
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>, example = "active")]
    pub status: Option<ProjectStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn map_write_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::AlreadyExists(DUPLICATE_CODE.into())
    } else {
        e.into()
    }
}

async fn fetch_project(pool: &MySqlPool, id: u64) -> AppResult<Project> {
    sqlx::query_as::<_, Project>(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))
}

/// List projects
#[utoipa::path(
    get,
    path = "/api/projects",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Paginated projects", body = [Project]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn list_projects(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ProjectQuery>,
) -> AppResult<impl Responder> {
    auth.require(Action::ReadAll, Resource::Project)?;

    let mut filter = Filter::default();
    if let Some(status) = query.status {
        filter.push("status = ?", FilterValue::Str(status.to_string()));
    }

    let (page, per_page, offset) = page_window(query.page, query.per_page);
    let total = filter.count(pool.get_ref(), "projects").await?;
    let data: Vec<Project> = filter
        .fetch_page(
            pool.get_ref(),
            &format!("SELECT {PROJECT_COLUMNS} FROM projects"),
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

/// Get a project by id
#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn get_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    auth.require(Action::Read, Resource::Project)?;
    Ok(HttpResponse::Ok().json(fetch_project(pool.get_ref(), path.into_inner()).await?))
}

/// Create a project (manager/owner)
#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Missing fields or duplicate code"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn create_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProject>,
) -> AppResult<impl Responder> {
    auth.require(Action::Create, Resource::Project)?;

    let name = required("name", &payload.name)?;
    let code = required("code", &payload.code)?;
    let status = payload.status.unwrap_or(ProjectStatus::Active);

    let result = sqlx::query(
        "INSERT INTO projects (name, code, description, status) VALUES (?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(&code)
    .bind(&payload.description)
    .bind(status)
    .execute(pool.get_ref())
    .await
    .map_err(map_write_error)?;

    info!(code = %code, created_by = auth.user_id, "Project created");

    let project = fetch_project(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(project))
}

/// Update a project (manager/owner)
#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    request_body = UpdateProject,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Invalid input or duplicate code"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn update_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateProject>,
) -> AppResult<impl Responder> {
    auth.require(Action::UpdateAny, Resource::Project)?;
    let id = path.into_inner();
    let current = fetch_project(pool.get_ref(), id).await?;

    let name = match &payload.name {
        Some(n) => required("name", n)?,
        None => current.name,
    };
    let code = match &payload.code {
        Some(c) => required("code", c)?,
        None => current.code,
    };
    let description = payload.description.clone().or(current.description);
    let status = payload.status.unwrap_or(current.status);

    sqlx::query("UPDATE projects SET name = ?, code = ?, description = ?, status = ? WHERE id = ?")
        .bind(&name)
        .bind(&code)
        .bind(&description)
        .bind(status)
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(map_write_error)?;

    Ok(HttpResponse::Ok().json(fetch_project(pool.get_ref(), id).await?))
}

/// Delete a project (manager/owner)
#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Project still has timesheets")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn delete_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    auth.require(Action::Delete, Resource::Project)?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::Conflict("Project still has timesheets".into())
            } else {
                e.into()
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Project not found"));
    }

    info!(project_id = id, deleted_by = auth.user_id, "Project deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("code", "  PRJ-9 ").unwrap(), "PRJ-9");
        assert!(matches!(required("name", "   "), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn non_constraint_errors_stay_internal() {
        assert!(matches!(
            map_write_error(sqlx::Error::RowNotFound),
            AppError::Internal(_)
        ));
    }

    fn manager() -> AuthUser {
        AuthUser {
            user_id: 3,
            email: "mia@company.com".into(),
            role: crate::model::role::Role::Manager,
        }
    }

    fn payload(code: &str) -> web::Json<CreateProject> {
        web::Json(CreateProject {
            name: "Payroll revamp".into(),
            code: code.into(),
            description: None,
            status: None,
        })
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_code_is_a_bad_request(pool: MySqlPool) {
        let pool = web::Data::new(pool);

        assert!(create_project(manager(), pool.clone(), payload("PRJ-001")).await.is_ok());
        let err = match create_project(manager(), pool.clone(), payload(" PRJ-001 ")).await {
            Err(e) => e,
            Ok(_) => panic!("duplicate code was accepted"),
        };

        assert!(matches!(err, AppError::AlreadyExists(ref m) if m == DUPLICATE_CODE));
        assert_eq!(err.status_code(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn referenced_project_cannot_be_deleted(pool: MySqlPool) {
        let user_id = crate::db::insert_test_user(&pool, "kim@company.com", crate::model::role::Role::Employee, None).await;
        let project_id = sqlx::query("INSERT INTO projects (name, code) VALUES ('Audit', 'AUD-1')")
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_id();
        sqlx::query(
            "INSERT INTO timesheets (user_id, project_id, date, start_time, end_time) \
             VALUES (?, ?, '2026-03-02', '09:00', '12:00')",
        )
        .bind(user_id)
        .bind(project_id)
        .execute(&pool)
        .await
        .unwrap();

        let result = delete_project(manager(), web::Data::new(pool), web::Path::from(project_id)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
