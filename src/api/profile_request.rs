use crate::api::{Filter, FilterValue, Paginated, optional_json, page_window, review};
use crate::auth::auth::AuthUser;
use crate::auth::policy::{Action, Resource};
use crate::engine::approval::{Reviewable, Verdict};
use crate::error::{AppError, AppResult};
use crate::model::decision::ApprovalStatus;
use crate::model::profile_request::{PROFILE_REQUEST_COLUMNS, ProfileChangeRequest};
use crate::model::user::{SELF_EDITABLE_FIELDS, check_required_values};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateProfileRequest {
    #[schema(value_type = Object, example = json!({"phone": "+8801712345678", "address": "Dhaka"}))]
    pub changes: Map<String, Value>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProfileRequestQuery {
    pub user_id: Option<u64>,
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>, example = "pending")]
    pub status: Option<ApprovalStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReviewComments {
    #[schema(example = "Matches HR records")]
    pub comments: Option<String>,
}

/// Checks a proposed diff: non-empty, only self-editable fields, scalar values.
pub fn validate_changes(changes: &Map<String, Value>) -> AppResult<()> {
    if changes.is_empty() {
        return Err(AppError::invalid("changes must not be empty"));
    }

    for (key, value) in changes {
        if key == "role" {
            return Err(AppError::forbidden("Role cannot be changed by its owner"));
        }
        if !SELF_EDITABLE_FIELDS.iter().any(|(k, _)| k == key) {
            return Err(AppError::invalid(format!("Field cannot be changed: {key}")));
        }
        if !(value.is_string() || value.is_null()) {
            return Err(AppError::invalid(format!("{key} must be a string or null")));
        }
    }

    check_required_values(changes)
}

async fn fetch_request(pool: &MySqlPool, id: u64) -> AppResult<ProfileChangeRequest> {
    sqlx::query_as::<_, ProfileChangeRequest>(&format!(
        "SELECT {PROFILE_REQUEST_COLUMNS} FROM profile_change_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Profile change request not found"))
}

/// Propose changes to the caller's own profile
#[utoipa::path(
    post,
    path = "/api/profile-requests",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Request created", body = ProfileChangeRequest),
        (status = 400, description = "Empty or invalid changes"),
        (status = 403, description = "Attempt to change role")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn create_profile_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProfileRequest>,
) -> AppResult<impl Responder> {
    auth.require(Action::Create, Resource::ProfileRequest)?;
    validate_changes(&payload.changes)?;

    let result = sqlx::query(
        "INSERT INTO profile_change_requests (user_id, changes, status) VALUES (?, ?, 'pending')",
    )
    .bind(auth.user_id)
    .bind(Json(&payload.changes))
    .execute(pool.get_ref())
    .await?;

    info!(user_id = auth.user_id, fields = payload.changes.len(), "Profile change requested");

    let request = fetch_request(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(request))
}

/// List profile change requests
#[utoipa::path(
    get,
    path = "/api/profile-requests",
    params(ProfileRequestQuery),
    responses(
        (status = 200, description = "Paginated requests", body = [ProfileChangeRequest]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn list_profile_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ProfileRequestQuery>,
) -> AppResult<impl Responder> {
    let mut filter = Filter::default();

    if auth.can(Action::ReadAll, Resource::ProfileRequest) {
        if let Some(user_id) = query.user_id {
            filter.push("user_id = ?", FilterValue::U64(user_id));
        }
    } else {
        let user_id =
            auth.target_user(query.user_id, Action::ReadAll, Resource::ProfileRequest)?;
        filter.push("user_id = ?", FilterValue::U64(user_id));
    }

    if let Some(status) = query.status {
        filter.push("status = ?", FilterValue::Str(status.to_string()));
    }

    let (page, per_page, offset) = page_window(query.page, query.per_page);
    let total = filter.count(pool.get_ref(), "profile_change_requests").await?;
    let data: Vec<ProfileChangeRequest> = filter
        .fetch_page(
            pool.get_ref(),
            &format!("SELECT {PROFILE_REQUEST_COLUMNS} FROM profile_change_requests"),
            "created_at DESC",
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

async fn decide_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    id: u64,
    verdict: Verdict,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let comments = optional_json::<ReviewComments>(&body)?.comments;

    review(
        pool.get_ref(),
        &auth,
        Reviewable::ProfileRequest,
        id,
        verdict,
        comments.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(fetch_request(pool.get_ref(), id).await?))
}

/// Approve a profile change and apply it (manager/owner)
#[utoipa::path(
    patch,
    path = "/api/profile-requests/{id}/approve",
    params(("id" = u64, Path, description = "Profile change request id")),
    request_body = ReviewComments,
    responses(
        (status = 200, description = "Approved and applied", body = ProfileChangeRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Request is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn approve_profile_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Bytes,
) -> AppResult<impl Responder> {
    decide_request(auth, pool, path.into_inner(), Verdict::Approved, body).await
}

/// Reject a profile change (manager/owner)
#[utoipa::path(
    patch,
    path = "/api/profile-requests/{id}/reject",
    params(("id" = u64, Path, description = "Profile change request id")),
    request_body = ReviewComments,
    responses(
        (status = 200, description = "Rejected", body = ProfileChangeRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Request is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn reject_profile_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Bytes,
) -> AppResult<impl Responder> {
    decide_request(auth, pool, path.into_inner(), Verdict::Rejected, body).await
}
