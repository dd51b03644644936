use serde::{Deserialize, Serialize};

use crate::auth::{Actor, Capability};
use crate::domain::appointment::{Appointment, AppointmentId, AppointmentStatus};
use crate::domain::review::{validate_review_input, Review, ReviewId};
use crate::errors::{ApplicationError, DomainError, EntityKind, RepositoryError};
use crate::notify::{Notification, NotificationEvent};

use super::{new_id, BookingEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    pub appointment_id: AppointmentId,
    pub rating: i64,
    pub comment: String,
}

impl BookingEngine {
    /// Records the single review allowed for a completed appointment.
    pub async fn submit_review(
        &self,
        actor: &Actor,
        submission: ReviewSubmission,
    ) -> Result<Review, ApplicationError> {
        let mut appointment = self.load_appointment(&submission.appointment_id).await?;
        self.guard.require_owner(actor, &appointment.user_id)?;
        if appointment.status != AppointmentStatus::Completed {
            return Err(DomainError::invalid_state(
                EntityKind::Appointment,
                appointment.status.as_str(),
                "review",
            )
            .into());
        }
        let (rating, comment) = validate_review_input(submission.rating, &submission.comment)?;

        if let Some(existing) = self.ports.reviews.find_by_appointment(&appointment.id).await? {
            if appointment.review_id.as_ref() != Some(&existing.id) {
                self.link_review(&mut appointment, &existing.id, "booking.review.relinked").await;
            }
            return Err(DomainError::DuplicateReview { appointment_id: appointment.id }.into());
        }

        let now = self.clock.now();
        let review = Review {
            id: ReviewId(new_id()),
            appointment_id: appointment.id.clone(),
            user_id: actor.id.clone(),
            rating,
            comment,
            is_approved: false,
            created_at: now,
        };
        match self.ports.reviews.insert(review.clone()).await {
            Ok(()) => {}
            Err(RepositoryError::UniqueViolation { .. }) => {
                return Err(
                    DomainError::DuplicateReview { appointment_id: appointment.id }.into()
                );
            }
            Err(error) => return Err(error.into()),
        }
        self.link_review(&mut appointment, &review.id, "booking.review.linked").await;

        tracing::info!(
            event_name = "booking.review.submitted",
            review_id = %review.id.0,
            appointment_id = %review.appointment_id.0,
            rating = review.rating,
            "review submitted"
        );
        self.announce(
            Notification::new(NotificationEvent::ReviewSubmitted, &review.id.0, actor.clone(), now)
                .with_metadata("appointment_id", &review.appointment_id.0)
                .with_metadata("rating", review.rating.to_string()),
        )
        .await;

        Ok(review)
    }

    pub async fn approve_review(
        &self,
        actor: &Actor,
        review_id: &ReviewId,
    ) -> Result<Review, ApplicationError> {
        self.guard.require(actor, Capability::ApproveReview)?;
        let mut review = self.load_review(review_id).await?;
        if review.is_approved {
            return Ok(review);
        }

        review.is_approved = true;
        self.ports.reviews.save(review.clone()).await?;
        tracing::info!(
            event_name = "booking.review.approved",
            review_id = %review.id.0,
            "review approved"
        );
        Ok(review)
    }

    /// Removes a review and clears the appointment's reference to it.
    pub async fn delete_review(
        &self,
        actor: &Actor,
        review_id: &ReviewId,
    ) -> Result<(), ApplicationError> {
        self.guard.require(actor, Capability::DeleteReview)?;
        let review = self.load_review(review_id).await?;
        if !self.ports.reviews.delete(&review.id).await? {
            return Err(DomainError::not_found(EntityKind::Review, &review.id.0).into());
        }
        tracing::info!(
            event_name = "booking.review.deleted",
            review_id = %review.id.0,
            appointment_id = %review.appointment_id.0,
            "review deleted"
        );

        let appointment = self.ports.appointments.find_by_id(&review.appointment_id).await?;
        if let Some(mut appointment) = appointment {
            if appointment.review_id.as_ref() == Some(&review.id) {
                appointment.review_id = None;
                appointment.touch(self.clock.now());
                if let Err(error) = self.ports.appointments.save(appointment).await {
                    tracing::warn!(
                        event_name = "booking.review.unlink_failed",
                        review_id = %review.id.0,
                        error = %error,
                        "review deleted but appointment still references it"
                    );
                }
            }
        }
        Ok(())
    }

    /// Public listing: approved reviews only, newest first.
    pub async fn approved_reviews(&self) -> Result<Vec<Review>, ApplicationError> {
        let reviews = self.ports.reviews.list_all().await?;
        Ok(reviews.into_iter().filter(|review| review.is_approved).collect())
    }

    pub async fn my_reviews(&self, actor: &Actor) -> Result<Vec<Review>, ApplicationError> {
        Ok(self.ports.reviews.find_by_owner(&actor.id).await?)
    }

    pub async fn all_reviews(&self, actor: &Actor) -> Result<Vec<Review>, ApplicationError> {
        self.guard.require(actor, Capability::ViewAllRecords)?;
        Ok(self.ports.reviews.list_all().await?)
    }

    async fn load_review(&self, review_id: &ReviewId) -> Result<Review, ApplicationError> {
        self.ports
            .reviews
            .find_by_id(review_id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Review, &review_id.0).into())
    }

    /// Points the appointment at its review. A failed write is logged only;
    /// the next submission attempt repairs it.
    async fn link_review(
        &self,
        appointment: &mut Appointment,
        review_id: &ReviewId,
        event_name: &'static str,
    ) {
        appointment.review_id = Some(review_id.clone());
        appointment.touch(self.clock.now());
        match self.ports.appointments.save(appointment.clone()).await {
            Ok(()) => {
                tracing::info!(
                    event_name,
                    appointment_id = %appointment.id.0,
                    review_id = %review_id.0,
                    "appointment linked to review"
                );
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "booking.review.link_failed",
                    appointment_id = %appointment.id.0,
                    review_id = %review_id.0,
                    error = %error,
                    "could not link review to appointment"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::Actor;
    use crate::domain::appointment::{AppointmentId, AppointmentStatus};
    use crate::domain::review::ReviewId;
    use crate::errors::DomainError;
    use crate::lifecycle::testing::Harness;
    use crate::lifecycle::ReviewSubmission;
    use crate::notify::NotificationEvent;

    fn submission(appointment_id: &AppointmentId, rating: i64) -> ReviewSubmission {
        ReviewSubmission {
            appointment_id: appointment_id.clone(),
            rating,
            comment: "Beautiful work, thank you".to_string(),
        }
    }

    #[tokio::test]
    async fn completed_appointment_accepts_one_review() {
        let harness = Harness::new();
        let appointment = harness.book_with_status(5, AppointmentStatus::Completed).await;

        let review = harness
            .engine
            .submit_review(&harness.client, submission(&appointment.id, 5))
            .await
            .expect("review");
        assert!(!review.is_approved);
        assert!(harness.notifier.events().contains(&NotificationEvent::ReviewSubmitted));

        let stored = harness.engine.load_appointment(&appointment.id).await.expect("appointment");
        assert_eq!(stored.review_id, Some(review.id.clone()));

        let error = harness
            .engine
            .submit_review(&harness.client, submission(&appointment.id, 4))
            .await
            .expect_err("second review");
        assert!(matches!(error.domain(), Some(DomainError::DuplicateReview { .. })));
        assert_eq!(harness.engine.all_reviews(&harness.admin).await.expect("all").len(), 1);
    }

    #[tokio::test]
    async fn review_gate_checks_owner_state_and_input() {
        let harness = Harness::new();
        let pending = harness.book(5).await;
        let completed = harness.book_with_status(5, AppointmentStatus::Completed).await;

        let error = harness
            .engine
            .submit_review(&harness.client, submission(&AppointmentId("nope".to_string()), 5))
            .await
            .expect_err("missing");
        assert!(matches!(error.domain(), Some(DomainError::NotFound { .. })));

        let error = harness
            .engine
            .submit_review(&Actor::client("client-2"), submission(&completed.id, 5))
            .await
            .expect_err("stranger");
        assert!(matches!(error.domain(), Some(DomainError::Unauthorized { .. })));

        let error = harness
            .engine
            .submit_review(&harness.client, submission(&pending.id, 5))
            .await
            .expect_err("not completed");
        assert!(matches!(error.domain(), Some(DomainError::InvalidState { .. })));

        for rating in [0, 6] {
            let error = harness
                .engine
                .submit_review(&harness.client, submission(&completed.id, rating))
                .await
                .expect_err("bad rating");
            assert!(matches!(
                error.domain(),
                Some(DomainError::Validation { field, .. }) if field == "rating"
            ));
        }
    }

    #[tokio::test]
    async fn duplicate_submission_repairs_missing_back_reference() {
        let harness = Harness::new();
        let appointment = harness.book_with_status(5, AppointmentStatus::Completed).await;
        let review = harness
            .engine
            .submit_review(&harness.client, submission(&appointment.id, 5))
            .await
            .expect("review");

        let mut broken = harness.engine.load_appointment(&appointment.id).await.expect("stored");
        broken.review_id = None;
        broken.touch(harness.now());
        harness.ports.appointments.save(broken).await.expect("drop back-reference");

        let error = harness
            .engine
            .submit_review(&harness.client, submission(&appointment.id, 3))
            .await
            .expect_err("still a duplicate");
        assert!(matches!(error.domain(), Some(DomainError::DuplicateReview { .. })));

        let repaired = harness.engine.load_appointment(&appointment.id).await.expect("stored");
        assert_eq!(repaired.review_id, Some(review.id));
        assert_eq!(harness.engine.all_reviews(&harness.admin).await.expect("all").len(), 1);
    }

    #[tokio::test]
    async fn approval_publishes_review() {
        let harness = Harness::new();
        let appointment = harness.book_with_status(5, AppointmentStatus::Completed).await;
        let review = harness
            .engine
            .submit_review(&harness.client, submission(&appointment.id, 4))
            .await
            .expect("review");
        assert!(harness.engine.approved_reviews().await.expect("public").is_empty());

        let error = harness
            .engine
            .approve_review(&harness.client, &review.id)
            .await
            .expect_err("client approval");
        assert!(matches!(error.domain(), Some(DomainError::Unauthorized { .. })));

        let approved = harness.engine.approve_review(&harness.admin, &review.id).await.expect("ok");
        assert!(approved.is_approved);
        assert_eq!(harness.engine.approved_reviews().await.expect("public").len(), 1);
        assert_eq!(harness.engine.my_reviews(&harness.client).await.expect("mine").len(), 1);

        let error = harness
            .engine
            .approve_review(&harness.admin, &ReviewId("missing".to_string()))
            .await
            .expect_err("missing");
        assert!(matches!(error.domain(), Some(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn deleting_a_review_reopens_the_gate() {
        let harness = Harness::new();
        let appointment = harness.book_with_status(5, AppointmentStatus::Completed).await;
        let review = harness
            .engine
            .submit_review(&harness.client, submission(&appointment.id, 2))
            .await
            .expect("review");

        assert!(harness.engine.delete_review(&harness.client, &review.id).await.is_err());
        harness.engine.delete_review(&harness.admin, &review.id).await.expect("delete");

        let views = harness.engine.my_appointments(&harness.client).await.expect("mine");
        assert!(!views[0].has_review);
        assert_eq!(views[0].appointment.review_id, None);

        harness
            .engine
            .submit_review(&harness.client, submission(&appointment.id, 5))
            .await
            .expect("new review");
    }
}
