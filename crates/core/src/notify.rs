//! Outbound notifications for committed lifecycle transitions.
//!
//! Delivery (email or otherwise) is a collaborator concern. The engine hands a
//! [`Notification`] to a [`Notifier`] after the state change is stored and
//! only logs when delivery fails.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Actor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    QuoteRequested,
    QuoteResponded,
    AppointmentRequested,
    AppointmentConfirmed,
    AppointmentCancelledByAdmin,
    AppointmentCancelledByClient,
    AppointmentRescheduled,
    ReviewSubmitted,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteRequested => "quote_requested",
            Self::QuoteResponded => "quote_responded",
            Self::AppointmentRequested => "appointment_requested",
            Self::AppointmentConfirmed => "appointment_confirmed",
            Self::AppointmentCancelledByAdmin => "appointment_cancelled_by_admin",
            Self::AppointmentCancelledByClient => "appointment_cancelled_by_client",
            Self::AppointmentRescheduled => "appointment_rescheduled",
            Self::ReviewSubmitted => "review_submitted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event_id: String,
    pub event: NotificationEvent,
    /// Id of the quote, appointment or review the event is about.
    pub subject_id: String,
    pub actor: Actor,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        event: NotificationEvent,
        subject_id: impl Into<String>,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event,
            subject_id: subject_id.into(),
            actor,
            metadata: BTreeMap::new(),
            occurred_at,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Hands `notification` to `notifier`, logging and discarding any failure.
pub async fn dispatch(notifier: &dyn Notifier, notification: Notification) {
    let event = notification.event;
    let subject_id = notification.subject_id.clone();
    if let Err(error) = notifier.notify(notification).await {
        tracing::warn!(
            event_name = "booking.notify.failed",
            notification = event.as_str(),
            subject_id = %subject_id,
            error = %error,
            "notification dropped"
        );
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.sent().into_iter().map(|notification| notification.event).collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}

/// Writes every notification to the log instead of delivering it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            event_name = "booking.notify.logged",
            notification = notification.event.as_str(),
            subject_id = %notification.subject_id,
            actor_id = %notification.actor.id.0,
            metadata = ?notification.metadata,
            "notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::{
        dispatch, InMemoryNotifier, Notification, NotificationEvent, Notifier, NotifyError,
    };
    use crate::auth::Actor;

    struct Unreachable;

    #[async_trait]
    impl Notifier for Unreachable {
        async fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
            Err(NotifyError("smtp unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn in_memory_notifier_keeps_metadata() {
        let notifier = InMemoryNotifier::default();
        dispatch(
            &notifier,
            Notification::new(
                NotificationEvent::AppointmentRescheduled,
                "A-1",
                Actor::client("client-1"),
                Utc::now(),
            )
            .with_metadata("old_date", "Monday")
            .with_metadata("new_date", "Friday"),
        )
        .await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject_id, "A-1");
        assert_eq!(sent[0].metadata.get("new_date").map(String::as_str), Some("Friday"));
    }

    #[tokio::test]
    async fn dispatch_swallows_delivery_failures() {
        dispatch(
            &Unreachable,
            Notification::new(
                NotificationEvent::ReviewSubmitted,
                "R-1",
                Actor::client("client-1"),
                Utc::now(),
            ),
        )
        .await;
    }
}
