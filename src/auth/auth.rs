use crate::auth::policy::{Action, Resource, authorize};
use crate::error::{AppError, AppResult};
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Caller identity resolved by the auth middleware from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Missing token".into())),
        )
    }
}

impl AuthUser {
    pub fn can(&self, action: Action, resource: Resource) -> bool {
        authorize(self.role, action, resource).is_allowed()
    }

    pub fn require(&self, action: Action, resource: Resource) -> AppResult<()> {
        if self.can(action, resource) {
            Ok(())
        } else {
            tracing::info!(
                user_id = self.user_id,
                email = %self.email,
                role = %self.role,
                ?action,
                %resource,
                "Access denied"
            );
            Err(AppError::forbidden("Insufficient role"))
        }
    }

    /// Resolves whose records a request targets. Acting on another user needs
    /// `escalation` on `resource`.
    pub fn target_user(
        &self,
        requested: Option<u64>,
        escalation: Action,
        resource: Resource,
    ) -> AppResult<u64> {
        match requested {
            Some(id) if id != self.user_id => {
                self.require(escalation, resource)?;
                Ok(id)
            }
            _ => Ok(self.user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 10,
            email: "x@company.com".into(),
            role,
        }
    }

    #[test]
    fn require_maps_denial_to_forbidden() {
        let err = user(Role::Employee)
            .require(Action::Review, Resource::Permission)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(user(Role::Owner).require(Action::Review, Resource::Permission).is_ok());
    }

    #[test]
    fn target_user_defaults_to_self() {
        let employee = user(Role::Employee);
        assert_eq!(
            employee
                .target_user(None, Action::ActOnBehalf, Resource::Leave)
                .unwrap(),
            10
        );
        assert_eq!(
            employee
                .target_user(Some(10), Action::ActOnBehalf, Resource::Leave)
                .unwrap(),
            10
        );
    }

    #[test]
    fn target_user_other_needs_escalation() {
        assert!(
            user(Role::Employee)
                .target_user(Some(11), Action::ActOnBehalf, Resource::Leave)
                .is_err()
        );
        assert_eq!(
            user(Role::Hr)
                .target_user(Some(11), Action::ActOnBehalf, Resource::Leave)
                .unwrap(),
            11
        );
    }
}
