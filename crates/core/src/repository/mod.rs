//! Persistence ports.
//!
//! `save` on quotes and appointments is a compare-and-swap on `version`: a
//! stored row is replaced only when its version is exactly one behind the
//! incoming value, and a new row must arrive with version 1.

use async_trait::async_trait;

use crate::domain::appointment::{Appointment, AppointmentId};
use crate::domain::quote::{Quote, QuoteId};
use crate::domain::review::{Review, ReviewId};
use crate::domain::user::{User, UserId};
use crate::errors::RepositoryError;

pub mod memory;

pub use memory::{
    InMemoryAppointmentRepository, InMemoryQuoteRepository, InMemoryReviewRepository,
    InMemoryUserRepository,
};

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Quote>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Quote>, RepositoryError>;
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &AppointmentId)
        -> Result<Option<Appointment>, RepositoryError>;
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Appointment>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Appointment>, RepositoryError>;
    async fn save(&self, appointment: Appointment) -> Result<(), RepositoryError>;
    /// Returns `false` when nothing was stored under `id`.
    async fn delete(&self, id: &AppointmentId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn find_by_id(&self, id: &ReviewId) -> Result<Option<Review>, RepositoryError>;
    async fn find_by_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Review>, RepositoryError>;
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Review>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Review>, RepositoryError>;
    /// Creates a review. Fails with `UniqueViolation` when the appointment already has one.
    async fn insert(&self, review: Review) -> Result<(), RepositoryError>;
    /// Updates an existing review in place.
    async fn save(&self, review: Review) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &ReviewId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;
    /// The administrator with the oldest `created_at`; ties broken by id.
    async fn find_earliest_admin(&self) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}
