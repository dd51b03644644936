use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{Actor, Capability};
use crate::domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, CancelledBy, StatusChange,
};
use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
use crate::errors::{ApplicationError, DomainError, EntityKind};
use crate::notify::{Notification, NotificationEvent};
use crate::window::RescheduleWindow;

use super::{new_id, BookingEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub quote_id: QuoteId,
    /// RFC 3339 or local `YYYY-MM-DDTHH:MM`.
    pub requested_date: Option<String>,
    pub client_phone: String,
}

/// Returned when an appointment was stored but its quote could not be marked
/// accepted. The appointment is flagged `needs_reconciliation` for staff follow-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationMarker {
    pub appointment_id: AppointmentId,
    pub quote_id: QuoteId,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    /// The accepted quote; `None` when the flip failed.
    pub quote: Option<Quote>,
    pub reconciliation: Option<ReconciliationMarker>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub appointment: Appointment,
    pub change: StatusChange,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleOutcome {
    pub appointment: Appointment,
    pub window: RescheduleWindow,
    /// Previous and new dates rendered for notifications.
    pub old_date: String,
    pub new_date: String,
    /// The appointment was admin-cancelled and is back to `pending`.
    pub reactivated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentView {
    pub appointment: Appointment,
    pub has_review: bool,
}

impl BookingEngine {
    /// Books an appointment against a quote the client owns.
    ///
    /// The appointment is written first and the quote flipped second. If the
    /// flip loses a race with another booking of the same quote, the new
    /// appointment is withdrawn and the call fails with `Conflict`. Any other
    /// flip failure keeps the appointment, flags it for reconciliation and
    /// returns a [`ReconciliationMarker`] in the outcome.
    pub async fn create_appointment(
        &self,
        actor: &Actor,
        request: BookingRequest,
    ) -> Result<BookingOutcome, ApplicationError> {
        let client_phone = request.client_phone.trim();
        if client_phone.is_empty() {
            return Err(DomainError::validation("client_phone", "phone number is required").into());
        }
        let requested_date =
            self.formatter.parse_input("requested_date", request.requested_date.as_deref())?;

        let quote = self.load_quote(&request.quote_id).await?;
        quote.ensure_bookable_by(&actor.id)?;
        if quote.status == QuoteStatus::Accepted {
            self.ensure_no_live_booking(actor, &quote.id).await?;
        }

        let now = self.clock.now();
        let mut appointment = Appointment {
            id: AppointmentId(new_id()),
            user_id: actor.id.clone(),
            client_phone: client_phone.to_string(),
            service: quote.service.clone(),
            requested_date,
            status: AppointmentStatus::Pending,
            cancellation: None,
            notes: quote.notes.clone(),
            design_ids: quote.design_ids.clone(),
            quote_id: quote.id.clone(),
            review_id: None,
            needs_reconciliation: false,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.ports.appointments.save(appointment.clone()).await?;

        let (quote, reconciliation) = match self.accept_quote(quote, &actor.id).await {
            Ok(accepted) => (Some(accepted), None),
            Err(error @ ApplicationError::Conflict(_)) => {
                self.withdraw_booking(&mut appointment, &error).await;
                return Err(error);
            }
            Err(error) => {
                let marker = self.flag_for_reconciliation(&mut appointment, &error).await;
                (None, Some(marker))
            }
        };

        tracing::info!(
            event_name = "booking.appointment.requested",
            appointment_id = %appointment.id.0,
            quote_id = %appointment.quote_id.0,
            user_id = %actor.id.0,
            "appointment requested"
        );
        self.announce(
            Notification::new(
                NotificationEvent::AppointmentRequested,
                &appointment.id.0,
                actor.clone(),
                now,
            )
            .with_metadata("service", &appointment.service)
            .with_metadata("requested_date", self.formatter.format(appointment.requested_date)),
        )
        .await;

        Ok(BookingOutcome { appointment, quote, reconciliation })
    }

    /// Direct status edit by staff. Setting the current status is a no-op.
    pub async fn set_appointment_status(
        &self,
        actor: &Actor,
        appointment_id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<StatusUpdate, ApplicationError> {
        self.guard.require(actor, Capability::SetAppointmentStatus)?;
        let mut appointment = self.load_appointment(appointment_id).await?;

        let now = self.clock.now();
        let change = appointment.set_status_as_admin(status, now);
        if change.is_noop() {
            return Ok(StatusUpdate { appointment, change });
        }
        self.ports.appointments.save(appointment.clone()).await?;

        tracing::info!(
            event_name = "booking.appointment.status_changed",
            appointment_id = %appointment.id.0,
            from = change.from.as_str(),
            to = change.to.as_str(),
            "appointment status changed"
        );
        let event = match change.to {
            AppointmentStatus::Confirmed => Some(NotificationEvent::AppointmentConfirmed),
            AppointmentStatus::Cancelled => Some(NotificationEvent::AppointmentCancelledByAdmin),
            AppointmentStatus::Pending | AppointmentStatus::Completed => None,
        };
        if let Some(event) = event {
            self.announce(
                Notification::new(event, &appointment.id.0, actor.clone(), now)
                    .with_metadata("user_id", &appointment.user_id.0)
                    .with_metadata("date", self.formatter.format(appointment.requested_date)),
            )
            .await;
        }

        Ok(StatusUpdate { appointment, change })
    }

    pub async fn cancel_as_client(
        &self,
        actor: &Actor,
        appointment_id: &AppointmentId,
    ) -> Result<Appointment, ApplicationError> {
        let mut appointment = self.load_appointment(appointment_id).await?;
        self.guard.require_owner(actor, &appointment.user_id)?;
        if matches!(appointment.status, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
        {
            return Err(DomainError::invalid_state(
                EntityKind::Appointment,
                appointment.status.as_str(),
                "cancel",
            )
            .into());
        }

        let now = self.clock.now();
        appointment.cancel(CancelledBy::Client, now);
        self.ports.appointments.save(appointment.clone()).await?;

        tracing::info!(
            event_name = "booking.appointment.cancelled",
            appointment_id = %appointment.id.0,
            cancelled_by = CancelledBy::Client.as_str(),
            "appointment cancelled"
        );
        self.announce(
            Notification::new(
                NotificationEvent::AppointmentCancelledByClient,
                &appointment.id.0,
                actor.clone(),
                now,
            )
            .with_metadata("date", self.formatter.format(appointment.requested_date)),
        )
        .await;

        Ok(appointment)
    }

    pub async fn reschedule(
        &self,
        actor: &Actor,
        appointment_id: &AppointmentId,
        new_date: Option<&str>,
    ) -> Result<RescheduleOutcome, ApplicationError> {
        let mut appointment = self.load_appointment(appointment_id).await?;
        self.guard.require_owner_or_admin(actor, &appointment.user_id)?;
        let new_date = self.formatter.parse_input("requested_date", new_date)?;

        let now = self.clock.now();
        let window = self.reschedule_window_for(actor, &appointment, now)?;
        window.check(new_date)?;

        let old_date = appointment.requested_date;
        let reactivated = apply_reschedule(&mut appointment, actor, new_date, now);
        self.ports.appointments.save(appointment.clone()).await?;

        let old_date = self.formatter.format(old_date);
        let new_date = self.formatter.format(new_date);
        tracing::info!(
            event_name = "booking.appointment.rescheduled",
            appointment_id = %appointment.id.0,
            actor_role = actor.role.as_str(),
            days_remaining = window.days_remaining,
            reactivated,
            status = appointment.status.as_str(),
            "appointment rescheduled"
        );
        self.announce(
            Notification::new(
                NotificationEvent::AppointmentRescheduled,
                &appointment.id.0,
                actor.clone(),
                now,
            )
            .with_metadata("old_date", &old_date)
            .with_metadata("new_date", &new_date)
            .with_metadata("status", appointment.status.as_str()),
        )
        .await;

        Ok(RescheduleOutcome { appointment, window, old_date, new_date, reactivated })
    }

    /// The range a reschedule by `actor` would currently be checked against.
    pub async fn preview_reschedule_window(
        &self,
        actor: &Actor,
        appointment_id: &AppointmentId,
    ) -> Result<RescheduleWindow, ApplicationError> {
        let appointment = self.load_appointment(appointment_id).await?;
        Ok(self.reschedule_window_for(actor, &appointment, self.clock.now())?)
    }

    pub async fn my_appointments(
        &self,
        actor: &Actor,
    ) -> Result<Vec<AppointmentView>, ApplicationError> {
        let appointments = self.ports.appointments.find_by_owner(&actor.id).await?;
        self.with_review_flags(appointments).await
    }

    pub async fn all_appointments(
        &self,
        actor: &Actor,
    ) -> Result<Vec<AppointmentView>, ApplicationError> {
        self.guard.require(actor, Capability::ViewAllRecords)?;
        let appointments = self.ports.appointments.list_all().await?;
        self.with_review_flags(appointments).await
    }

    pub(super) async fn load_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Appointment, ApplicationError> {
        self.ports
            .appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Appointment, &appointment_id.0).into())
    }

    fn reschedule_window_for(
        &self,
        actor: &Actor,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<RescheduleWindow, DomainError> {
        self.guard.require_owner_or_admin(actor, &appointment.user_id)?;

        match appointment.status {
            AppointmentStatus::Completed => Err(DomainError::invalid_state(
                EntityKind::Appointment,
                appointment.status.as_str(),
                "reschedule",
            )),
            AppointmentStatus::Cancelled => match appointment.cancelled_by() {
                Some(CancelledBy::Admin) => {
                    self.guard.require_owner(actor, &appointment.user_id)?;
                    Ok(self.policy.reactivation_window(appointment.requested_date, now))
                }
                Some(CancelledBy::Client) | None => Err(DomainError::invalid_state(
                    EntityKind::Appointment,
                    "cancelled by client",
                    "reschedule",
                )),
            },
            AppointmentStatus::Pending | AppointmentStatus::Confirmed => {
                self.policy.window(appointment.requested_date, now)
            }
        }
    }

    async fn ensure_no_live_booking(
        &self,
        actor: &Actor,
        quote_id: &QuoteId,
    ) -> Result<(), ApplicationError> {
        let booked = self
            .ports
            .appointments
            .find_by_owner(&actor.id)
            .await?
            .into_iter()
            .any(|existing| {
                &existing.quote_id == quote_id && existing.status != AppointmentStatus::Cancelled
            });
        if booked {
            return Err(DomainError::invalid_state(
                EntityKind::Quote,
                QuoteStatus::Accepted.as_str(),
                "book a second appointment against",
            )
            .into());
        }
        Ok(())
    }

    /// Removes an appointment whose quote was consumed by a concurrent booking.
    async fn withdraw_booking(&self, appointment: &mut Appointment, cause: &ApplicationError) {
        match self.ports.appointments.delete(&appointment.id).await {
            Ok(_) => {
                tracing::warn!(
                    event_name = "booking.appointment.withdrawn",
                    appointment_id = %appointment.id.0,
                    quote_id = %appointment.quote_id.0,
                    error = %cause,
                    "quote already consumed by another booking"
                );
            }
            Err(error) => {
                tracing::error!(
                    event_name = "booking.appointment.withdraw_failed",
                    appointment_id = %appointment.id.0,
                    error = %error,
                    "could not withdraw losing booking"
                );
                self.flag_for_reconciliation(appointment, cause).await;
            }
        }
    }

    async fn flag_for_reconciliation(
        &self,
        appointment: &mut Appointment,
        cause: &ApplicationError,
    ) -> ReconciliationMarker {
        appointment.needs_reconciliation = true;
        appointment.touch(self.clock.now());
        if let Err(error) = self.ports.appointments.save(appointment.clone()).await {
            tracing::error!(
                event_name = "booking.appointment.flag_failed",
                appointment_id = %appointment.id.0,
                error = %error,
                "could not persist reconciliation flag"
            );
        }

        tracing::error!(
            event_name = "booking.appointment.needs_reconciliation",
            appointment_id = %appointment.id.0,
            quote_id = %appointment.quote_id.0,
            error = %cause,
            "appointment stored but quote was not accepted"
        );
        ReconciliationMarker {
            appointment_id: appointment.id.clone(),
            quote_id: appointment.quote_id.clone(),
            reason: cause.to_string(),
        }
    }

    async fn with_review_flags(
        &self,
        appointments: Vec<Appointment>,
    ) -> Result<Vec<AppointmentView>, ApplicationError> {
        let mut views = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let has_review = appointment.review_id.is_some()
                || self.ports.reviews.find_by_appointment(&appointment.id).await?.is_some();
            views.push(AppointmentView { appointment, has_review });
        }
        Ok(views)
    }
}

/// Moves the appointment and settles its status. Returns whether an
/// admin-cancelled appointment was reactivated.
fn apply_reschedule(
    appointment: &mut Appointment,
    actor: &Actor,
    new_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    appointment.requested_date = new_date;
    let reactivated = appointment.status == AppointmentStatus::Cancelled;
    if reactivated {
        appointment.status = AppointmentStatus::Pending;
        appointment.cancellation = None;
    } else if appointment.status == AppointmentStatus::Confirmed && !actor.role.is_admin() {
        appointment.status = AppointmentStatus::Pending;
    }
    appointment.touch(now);
    reactivated
}
