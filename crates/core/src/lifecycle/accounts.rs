use crate::auth::{Actor, Capability};
use crate::domain::user::{AccountRole, User, UserId};
use crate::errors::{ApplicationError, DomainError, EntityKind};

use super::BookingEngine;

impl BookingEngine {
    /// Promotes or demotes an account. Reserved for the super admin, who
    /// cannot demote themselves.
    pub async fn set_user_role(
        &self,
        actor: &Actor,
        target: &UserId,
        role: AccountRole,
    ) -> Result<User, ApplicationError> {
        self.guard.require(actor, Capability::ChangeUserRole)?;
        let mut user = self
            .ports
            .users
            .find_by_id(target)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::User, &target.0))?;

        if actor.owns(&user.id) && role != AccountRole::Admin {
            return Err(DomainError::invalid_state(EntityKind::User, "super_admin", "demote").into());
        }
        if user.role == role {
            return Ok(user);
        }

        let previous = user.role;
        user.role = role;
        self.ports.users.save(user.clone()).await?;
        tracing::info!(
            event_name = "booking.user.role_changed",
            user_id = %user.id.0,
            from = previous.as_str(),
            to = role.as_str(),
            changed_by = %actor.id.0,
            "user role changed"
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::{Actor, Role};
    use crate::domain::user::{AccountRole, UserId};
    use crate::errors::DomainError;
    use crate::lifecycle::testing::Harness;

    #[tokio::test]
    async fn earliest_admin_resolves_as_super_admin() {
        let harness = Harness::new();
        harness.seed_users().await;

        let first = harness.engine.resolve_actor(&UserId("admin-1".to_string())).await;
        let second = harness.engine.resolve_actor(&UserId("admin-2".to_string())).await;
        let client = harness.engine.resolve_actor(&UserId("client-1".to_string())).await;

        assert_eq!(first.expect("admin-1").role, Role::SuperAdmin);
        assert_eq!(second.expect("admin-2").role, Role::Admin);
        assert_eq!(client.expect("client-1").role, Role::Client);

        let error = harness
            .engine
            .resolve_actor(&UserId("ghost".to_string()))
            .await
            .expect_err("unknown user");
        assert!(matches!(error.domain(), Some(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn super_admin_promotes_clients() {
        let harness = Harness::new();
        harness.seed_users().await;
        let super_admin = Actor::new("admin-1", Role::SuperAdmin);

        let promoted = harness
            .engine
            .set_user_role(&super_admin, &UserId("client-1".to_string()), AccountRole::Admin)
            .await
            .expect("promote");
        assert_eq!(promoted.role, AccountRole::Admin);

        let actor = harness
            .engine
            .resolve_actor(&UserId("client-1".to_string()))
            .await
            .expect("resolve");
        assert_eq!(actor.role, Role::Admin);
    }

    #[tokio::test]
    async fn regular_admins_cannot_change_roles() {
        let harness = Harness::new();
        harness.seed_users().await;

        let error = harness
            .engine
            .set_user_role(
                &Actor::admin("admin-2"),
                &UserId("client-1".to_string()),
                AccountRole::Admin,
            )
            .await
            .expect_err("not super admin");
        assert!(matches!(error.domain(), Some(DomainError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn super_admin_cannot_demote_themselves() {
        let harness = Harness::new();
        harness.seed_users().await;

        let error = harness
            .engine
            .set_user_role(
                &Actor::new("admin-1", Role::SuperAdmin),
                &UserId("admin-1".to_string()),
                AccountRole::Client,
            )
            .await
            .expect_err("self demotion");
        assert!(matches!(error.domain(), Some(DomainError::InvalidState { .. })));

        let error = harness
            .engine
            .set_user_role(
                &Actor::new("admin-1", Role::SuperAdmin),
                &UserId("nobody".to_string()),
                AccountRole::Admin,
            )
            .await
            .expect_err("missing target");
        assert!(matches!(error.domain(), Some(DomainError::NotFound { .. })));
    }
}
