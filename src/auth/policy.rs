//! Role-based authorization, independent of the HTTP layer.
//!
//! Self-scoped actions (`Create`, `Read`, `Update`) mean "on the caller's own
//! records". Acting on somebody else's records uses `ReadAll`, `UpdateAny` or
//! `ActOnBehalf`.

use crate::model::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    ReadAll,
    Update,
    UpdateAny,
    Delete,
    Review,
    ActOnBehalf,
    AssignRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Attendance,
    Permission,
    ProfileRequest,
    Leave,
    LeaveQuota,
    Project,
    Timesheet,
    WorkSetting,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn is_allowed(self) -> bool {
        self == Access::Allow
    }
}

fn allow_if(cond: bool) -> Access {
    if cond { Access::Allow } else { Access::Deny }
}

pub fn authorize(role: Role, action: Action, resource: Resource) -> Access {
    use Action::*;
    use Resource::*;

    let reviewer = matches!(role, Role::Manager | Role::Owner);
    let observer = matches!(role, Role::Supervisor | Role::Manager | Role::Owner | Role::Hr);
    let hr_admin = matches!(role, Role::Manager | Role::Owner | Role::Hr);

    match (action, resource) {
        // Approval workflow
        (Review, Attendance | Permission | ProfileRequest) => allow_if(reviewer),
        (Review, _) => Access::Deny,

        // Self-service records
        (Create | Read, Attendance | Permission | ProfileRequest | Leave | Timesheet) => {
            Access::Allow
        }
        (Update, Timesheet) => Access::Allow,
        (ReadAll, Attendance | Permission | ProfileRequest | Leave | Timesheet) => allow_if(observer),
        (ActOnBehalf, Leave) => allow_if(hr_admin),
        (UpdateAny, Timesheet) => allow_if(hr_admin),

        (Read, LeaveQuota) => Access::Allow,

        // Organization configuration
        (Read | ReadAll, Project | WorkSetting) => Access::Allow,
        (Create | Update | UpdateAny | Delete, Project) => allow_if(reviewer),
        (Create | Update | UpdateAny, WorkSetting) => allow_if(reviewer),

        // Accounts
        (Read | Update, User) => Access::Allow,
        (ReadAll, User) => allow_if(observer),
        (Create | UpdateAny | AssignRole, User) => allow_if(reviewer),

        _ => Access::Deny,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 5] = [
        Role::Employee,
        Role::Supervisor,
        Role::Manager,
        Role::Owner,
        Role::Hr,
    ];

    #[test]
    fn only_managers_and_owners_review() {
        for resource in [Resource::Attendance, Resource::Permission, Resource::ProfileRequest] {
            for role in ALL_ROLES {
                let expected = matches!(role, Role::Manager | Role::Owner);
                assert_eq!(
                    authorize(role, Action::Review, resource).is_allowed(),
                    expected,
                    "{role} reviewing {resource}"
                );
            }
        }
    }

    #[test]
    fn leave_is_never_reviewable() {
        assert_eq!(
            authorize(Role::Owner, Action::Review, Resource::Leave),
            Access::Deny
        );
    }

    #[test]
    fn everyone_can_clock_and_request() {
        for role in ALL_ROLES {
            assert!(authorize(role, Action::Create, Resource::Attendance).is_allowed());
            assert!(authorize(role, Action::Create, Resource::Permission).is_allowed());
            assert!(authorize(role, Action::Create, Resource::ProfileRequest).is_allowed());
        }
    }

    #[test]
    fn employees_cannot_see_other_peoples_attendance() {
        assert_eq!(
            authorize(Role::Employee, Action::ReadAll, Resource::Attendance),
            Access::Deny
        );
        assert!(authorize(Role::Supervisor, Action::ReadAll, Resource::Attendance).is_allowed());
    }

    #[test]
    fn role_assignment_is_restricted() {
        assert_eq!(
            authorize(Role::Employee, Action::AssignRole, Resource::User),
            Access::Deny
        );
        assert_eq!(authorize(Role::Hr, Action::AssignRole, Resource::User), Access::Deny);
        assert!(authorize(Role::Owner, Action::AssignRole, Resource::User).is_allowed());
    }

    #[test]
    fn project_writes_need_manager_or_owner() {
        assert_eq!(
            authorize(Role::Supervisor, Action::Create, Resource::Project),
            Access::Deny
        );
        assert!(authorize(Role::Manager, Action::Delete, Resource::Project).is_allowed());
        assert!(authorize(Role::Employee, Action::Read, Resource::Project).is_allowed());
    }
}
