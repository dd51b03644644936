//! Booking lifecycle: quotes, appointments, reviews and account roles.
//!
//! Every operation follows the same order: authorize, load, apply the domain
//! transition, persist, then notify. Notification runs only after the write
//! has been accepted and its failures are logged, never returned.

use std::sync::Arc;

use crate::auth::{Actor, AuthorizationGuard, Role};
use crate::clock::{Clock, SystemClock};
use crate::datetime::DateFormatter;
use crate::domain::user::UserId;
use crate::errors::{ApplicationError, DomainError, EntityKind};
use crate::notify::{self, Notification, Notifier};
use crate::repository::{
    AppointmentRepository, InMemoryAppointmentRepository, InMemoryQuoteRepository,
    InMemoryReviewRepository, InMemoryUserRepository, QuoteRepository, ReviewRepository,
    UserRepository,
};
use crate::window::DateWindowPolicy;

pub mod accounts;
pub mod appointments;
pub mod quotes;
pub mod reviews;

#[cfg(test)]
mod testing;

pub use appointments::{
    AppointmentView, BookingOutcome, BookingRequest, ReconciliationMarker, RescheduleOutcome,
    StatusUpdate,
};
pub use quotes::QuoteRequest;
pub use reviews::ReviewSubmission;

/// Storage handles the engine works against.
#[derive(Clone)]
pub struct BookingPorts {
    pub quotes: Arc<dyn QuoteRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl BookingPorts {
    pub fn in_memory() -> Self {
        Self {
            quotes: Arc::new(InMemoryQuoteRepository::default()),
            appointments: Arc::new(InMemoryAppointmentRepository::default()),
            reviews: Arc::new(InMemoryReviewRepository::default()),
            users: Arc::new(InMemoryUserRepository::default()),
        }
    }
}

pub struct BookingEngine {
    ports: BookingPorts,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    policy: DateWindowPolicy,
    formatter: DateFormatter,
    guard: AuthorizationGuard,
}

impl BookingEngine {
    pub fn new(ports: BookingPorts, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ports,
            notifier,
            clock: Arc::new(SystemClock),
            policy: DateWindowPolicy::default(),
            formatter: DateFormatter::default(),
            guard: AuthorizationGuard,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: DateWindowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_formatter(mut self, formatter: DateFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn policy(&self) -> &DateWindowPolicy {
        &self.policy
    }

    pub fn formatter(&self) -> &DateFormatter {
        &self.formatter
    }

    /// Loads `user_id` and derives the role it acts with.
    pub async fn resolve_actor(&self, user_id: &UserId) -> Result<Actor, ApplicationError> {
        let user = self
            .ports
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::User, &user_id.0))?;
        let earliest_admin = self.ports.users.find_earliest_admin().await?;
        let role = Role::resolve(&user, earliest_admin.as_ref().map(|admin| &admin.id));
        Ok(Actor { id: user.id, role })
    }

    async fn announce(&self, notification: Notification) {
        notify::dispatch(self.notifier.as_ref(), notification).await;
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
