use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::appointment::{Appointment, AppointmentId};
use crate::domain::quote::{Quote, QuoteId};
use crate::domain::review::{Review, ReviewId};
use crate::domain::user::{AccountRole, User, UserId};
use crate::errors::{EntityKind, RepositoryError};

use super::{AppointmentRepository, QuoteRepository, ReviewRepository, UserRepository};

fn check_version(
    entity: EntityKind,
    id: &str,
    stored: Option<u32>,
    incoming: u32,
) -> Result<(), RepositoryError> {
    let expected_version = incoming.saturating_sub(1);
    if stored.unwrap_or(0) == expected_version && incoming > 0 {
        return Ok(());
    }
    Err(RepositoryError::VersionConflict { entity, id: id.to_string(), expected_version })
}

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<String, Quote>>,
}

#[async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        let mut owned: Vec<Quote> =
            quotes.values().filter(|quote| quote.is_owned_by(owner)).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn list_all(&self) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        let mut all: Vec<Quote> = quotes.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let stored = quotes.get(&quote.id.0).map(|existing| existing.version);
        check_version(EntityKind::Quote, &quote.id.0, stored, quote.version)?;
        quotes.insert(quote.id.0.clone(), quote);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<String, Appointment>>,
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn find_by_id(
        &self,
        id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        Ok(appointments.get(&id.0).cloned())
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        let mut owned: Vec<Appointment> = appointments
            .values()
            .filter(|appointment| appointment.is_owned_by(owner))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.requested_date.cmp(&a.requested_date));
        Ok(owned)
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        let mut all: Vec<Appointment> = appointments.values().cloned().collect();
        all.sort_by(|a, b| b.requested_date.cmp(&a.requested_date));
        Ok(all)
    }

    async fn save(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        let mut appointments = self.appointments.write().await;
        let stored = appointments.get(&appointment.id.0).map(|existing| existing.version);
        check_version(EntityKind::Appointment, &appointment.id.0, stored, appointment.version)?;
        appointments.insert(appointment.id.0.clone(), appointment);
        Ok(())
    }

    async fn delete(&self, id: &AppointmentId) -> Result<bool, RepositoryError> {
        let mut appointments = self.appointments.write().await;
        Ok(appointments.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryReviewRepository {
    reviews: RwLock<HashMap<String, Review>>,
}

impl InMemoryReviewRepository {
    fn newest_first(mut reviews: Vec<Review>) -> Vec<Review> {
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reviews
    }
}

#[async_trait]
impl ReviewRepository for InMemoryReviewRepository {
    async fn find_by_id(&self, id: &ReviewId) -> Result<Option<Review>, RepositoryError> {
        let reviews = self.reviews.read().await;
        Ok(reviews.get(&id.0).cloned())
    }

    async fn find_by_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Review>, RepositoryError> {
        let reviews = self.reviews.read().await;
        Ok(reviews.values().find(|review| &review.appointment_id == appointment_id).cloned())
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Review>, RepositoryError> {
        let reviews = self.reviews.read().await;
        Ok(Self::newest_first(
            reviews.values().filter(|review| &review.user_id == owner).cloned().collect(),
        ))
    }

    async fn list_all(&self) -> Result<Vec<Review>, RepositoryError> {
        let reviews = self.reviews.read().await;
        Ok(Self::newest_first(reviews.values().cloned().collect()))
    }

    async fn insert(&self, review: Review) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.write().await;
        if reviews.contains_key(&review.id.0) {
            return Err(RepositoryError::UniqueViolation {
                entity: EntityKind::Review,
                key: review.id.0.clone(),
            });
        }
        if reviews.values().any(|existing| existing.appointment_id == review.appointment_id) {
            return Err(RepositoryError::UniqueViolation {
                entity: EntityKind::Review,
                key: review.appointment_id.0.clone(),
            });
        }
        reviews.insert(review.id.0.clone(), review);
        Ok(())
    }

    async fn save(&self, review: Review) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.write().await;
        match reviews.get_mut(&review.id.0) {
            Some(existing) if existing.appointment_id == review.appointment_id => {
                *existing = review;
                Ok(())
            }
            Some(_) => Err(RepositoryError::UniqueViolation {
                entity: EntityKind::Review,
                key: review.appointment_id.0.clone(),
            }),
            None => Err(RepositoryError::Storage(format!("review `{}` does not exist", review.id.0))),
        }
    }

    async fn delete(&self, id: &ReviewId) -> Result<bool, RepositoryError> {
        let mut reviews = self.reviews.write().await;
        Ok(reviews.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(all)
    }

    async fn find_earliest_admin(&self) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|user| user.role == AccountRole::Admin)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)))
            .cloned())
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.id.0.clone(), user);
        Ok(())
    }
}
