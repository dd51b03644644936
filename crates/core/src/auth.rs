//! Role and ownership checks.
//!
//! Every lifecycle operation runs its guard before touching storage, so a
//! refused call never leaves a partial write behind.

use serde::{Deserialize, Serialize};

use crate::domain::user::{AccountRole, User, UserId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Admin,
    /// The earliest-created administrator.
    SuperAdmin,
}

impl Role {
    pub fn resolve(user: &User, earliest_admin: Option<&UserId>) -> Self {
        match user.role {
            AccountRole::Client => Self::Client,
            AccountRole::Admin if earliest_admin == Some(&user.id) => Self::SuperAdmin,
            AccountRole::Admin => Self::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: UserId(id.into()), role }
    }

    pub fn client(id: impl Into<String>) -> Self {
        Self::new(id, Role::Client)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn owns(&self, owner: &UserId) -> bool {
        &self.id == owner
    }
}

/// Operations reserved for staff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RespondToQuote,
    SetAppointmentStatus,
    ApproveReview,
    DeleteReview,
    ViewAllRecords,
    ChangeUserRole,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RespondToQuote => "respond to quotes",
            Self::SetAppointmentStatus => "set appointment status",
            Self::ApproveReview => "approve reviews",
            Self::DeleteReview => "delete reviews",
            Self::ViewAllRecords => "view all records",
            Self::ChangeUserRole => "change user roles",
        }
    }

    fn allowed_for(&self, role: Role) -> bool {
        match self {
            Self::ChangeUserRole => role == Role::SuperAdmin,
            _ => role.is_admin(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    pub fn require(&self, actor: &Actor, capability: Capability) -> Result<(), DomainError> {
        if capability.allowed_for(actor.role) {
            return Ok(());
        }
        Err(DomainError::unauthorized(format!(
            "role `{}` may not {}",
            actor.role.as_str(),
            capability.as_str()
        )))
    }

    pub fn require_owner(&self, actor: &Actor, owner: &UserId) -> Result<(), DomainError> {
        if actor.owns(owner) {
            return Ok(());
        }
        Err(DomainError::unauthorized("only the owner may perform this action"))
    }

    pub fn require_owner_or_admin(
        &self,
        actor: &Actor,
        owner: &UserId,
    ) -> Result<(), DomainError> {
        if actor.role.is_admin() || actor.owns(owner) {
            return Ok(());
        }
        Err(DomainError::unauthorized("only the owner or an administrator may act on this"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Actor, AuthorizationGuard, Capability, Role};
    use crate::domain::user::{AccountRole, User, UserId};
    use crate::errors::DomainError;

    fn user(id: &str, role: AccountRole) -> User {
        User {
            id: UserId(id.to_string()),
            name: id.to_string(),
            email: format!("{id}@example.com"),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn earliest_admin_resolves_to_super_admin() {
        let first = user("admin-1", AccountRole::Admin);
        let second = user("admin-2", AccountRole::Admin);
        let client = user("client-1", AccountRole::Client);
        let earliest = Some(&first.id);

        assert_eq!(Role::resolve(&first, earliest), Role::SuperAdmin);
        assert_eq!(Role::resolve(&second, earliest), Role::Admin);
        assert_eq!(Role::resolve(&client, Some(&client.id)), Role::Client);
    }

    #[test]
    fn clients_cannot_use_staff_capabilities() {
        let guard = AuthorizationGuard;
        let client = Actor::client("client-1");

        for capability in [
            Capability::RespondToQuote,
            Capability::SetAppointmentStatus,
            Capability::ApproveReview,
            Capability::ChangeUserRole,
        ] {
            assert!(matches!(
                guard.require(&client, capability),
                Err(DomainError::Unauthorized { .. })
            ));
        }
    }

    #[test]
    fn only_super_admin_changes_roles() {
        let guard = AuthorizationGuard;
        assert!(guard.require(&Actor::admin("admin-2"), Capability::ChangeUserRole).is_err());
        assert!(guard
            .require(&Actor::new("admin-1", Role::SuperAdmin), Capability::ChangeUserRole)
            .is_ok());
        assert!(guard
            .require(&Actor::new("admin-1", Role::SuperAdmin), Capability::ApproveReview)
            .is_ok());
    }

    #[test]
    fn ownership_checks() {
        let guard = AuthorizationGuard;
        let owner = UserId("client-1".to_string());

        assert!(guard.require_owner(&Actor::client("client-1"), &owner).is_ok());
        assert!(guard.require_owner(&Actor::admin("admin-1"), &owner).is_err());
        assert!(guard.require_owner_or_admin(&Actor::admin("admin-1"), &owner).is_ok());
        assert!(guard.require_owner_or_admin(&Actor::client("client-2"), &owner).is_err());
    }
}
