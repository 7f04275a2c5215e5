use crate::api::ReviewNotes;
use crate::api::attendance::{AttendanceQuery, ReviewAttendance};
use crate::api::leave::LeaveFilter;
use crate::api::permission::{CreatePermission, PermissionQuery};
use crate::api::profile_request::{CreateProfileRequest, ProfileRequestQuery, ReviewComments};
use crate::api::project::{CreateProject, ProjectQuery, UpdateProject};
use crate::api::timesheet::{CreateTimesheet, TimesheetQuery, UpdateTimesheet};
use crate::api::user::{CreateUser, UserQuery};
use crate::api::work_setting::CreateWorkSetting;
use crate::engine::approval::Verdict;
use crate::engine::attendance::{ClockRequest, Coordinates, PermissionInput};
use crate::engine::leave::{ApplyLeave, LeaveApplied, Remaining};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, ClockType};
use crate::model::decision::{ApprovalStatus, Decision};
use crate::model::leave::{LeaveQuota, LeaveRecord, LeaveType};
use crate::model::permission::{Permission, PermissionKind};
use crate::model::profile_request::ProfileChangeRequest;
use crate::model::project::{Project, ProjectStatus};
use crate::model::role::Role;
use crate::model::timesheet::{Timesheet, TimesheetResponse};
use crate::model::user::User;
use crate::model::work_setting::WorkSetting;
use crate::models::{LoginReqDto, LoginResponse, RefreshReqDto, RefreshResponse};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRMS Attendance & Approvals API",
        version = "1.0.0",
        description = r#"
## Attendance, approvals and leave

### 🔹 Key Features
- **Attendance**
  - Clock in/out with server-side lateness and early-leave evaluation
  - Automatic permission requests for flagged clock events
- **Approvals**
  - Managers and owners approve or reject attendance, permissions and profile changes
- **Leave**
  - Annual and monthly sick quotas, balance reconciled on every application
- **Projects, timesheets, work settings, users**

### 🔐 Security
Every endpoint except `/api/auth/*` needs a **JWT Bearer** access token.
Refresh tokens are single use and rotate on every refresh.

### 📦 Response Format
- JSON bodies with camelCase fields
- Errors are `{"message": "..."}`
- List endpoints accept `page` and `perPage` (max 100)
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::clock,
        crate::api::attendance::my_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::review_attendance,

        crate::api::permission::create_permission,
        crate::api::permission::list_permissions,
        crate::api::permission::approve_permission,
        crate::api::permission::reject_permission,

        crate::api::profile_request::create_profile_request,
        crate::api::profile_request::list_profile_requests,
        crate::api::profile_request::approve_profile_request,
        crate::api::profile_request::reject_profile_request,

        crate::api::leave::get_quota,
        crate::api::leave::apply_leave,
        crate::api::leave::list_leaves,

        crate::api::project::list_projects,
        crate::api::project::get_project,
        crate::api::project::create_project,
        crate::api::project::update_project,
        crate::api::project::delete_project,

        crate::api::timesheet::list_timesheets,
        crate::api::timesheet::create_timesheet,
        crate::api::timesheet::update_timesheet,

        crate::api::work_setting::list_work_settings,
        crate::api::work_setting::create_work_setting,
        crate::api::work_setting::update_work_setting,

        crate::api::user::list_users,
        crate::api::user::me,
        crate::api::user::get_user,
        crate::api::user::create_user,
        crate::api::user::update_user
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            RefreshReqDto,
            RefreshResponse,
            Role,
            User,
            CreateUser,
            UserQuery,
            ApprovalStatus,
            Decision,
            Verdict,
            ReviewNotes,
            ReviewComments,
            ClockType,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceQuery,
            ClockRequest,
            Coordinates,
            PermissionInput,
            ReviewAttendance,
            PermissionKind,
            Permission,
            CreatePermission,
            PermissionQuery,
            ProfileChangeRequest,
            CreateProfileRequest,
            ProfileRequestQuery,
            LeaveType,
            LeaveRecord,
            LeaveQuota,
            LeaveFilter,
            ApplyLeave,
            LeaveApplied,
            Remaining,
            ProjectStatus,
            Project,
            CreateProject,
            UpdateProject,
            ProjectQuery,
            Timesheet,
            TimesheetResponse,
            CreateTimesheet,
            UpdateTimesheet,
            TimesheetQuery,
            WorkSetting,
            CreateWorkSetting
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and logout"),
        (name = "Attendance", description = "Clock events and attendance review"),
        (name = "Permission", description = "Lateness and early-leave permissions"),
        (name = "Profile", description = "Profile change requests"),
        (name = "Leave", description = "Leave quota and applications"),
        (name = "Project", description = "Project management"),
        (name = "Timesheet", description = "Worked time logging"),
        (name = "WorkSetting", description = "Shift policies per division"),
        (name = "User", description = "User accounts"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route_group_with_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/auth/login",
            "/api/attendance/clock",
            "/api/attendance/{id}/review",
            "/api/permissions/{id}/approve",
            "/api/profile-requests/{id}/reject",
            "/api/leaves/apply",
            "/api/projects/{id}",
            "/api/timesheets/{id}",
            "/api/work-settings/{id}",
            "/api/users/me",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        for schema in ["LeaveQuota", "LeaveApplied", "ReviewNotes", "ReviewComments"] {
            assert!(components.schemas.contains_key(schema), "missing schema {schema}");
        }
    }
}
