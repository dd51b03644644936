use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{DesignId, QuoteId};
use crate::domain::review::ReviewId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Client,
    Admin,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "client" => Some(Self::Client),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Attribution of a cancellation. Present exactly when the appointment is cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub by: CancelledBy,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub user_id: UserId,
    pub client_phone: String,
    pub service: String,
    pub requested_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub cancellation: Option<Cancellation>,
    pub notes: String,
    pub design_ids: Vec<DesignId>,
    pub quote_id: QuoteId,
    pub review_id: Option<ReviewId>,
    /// Set when the quote could not be marked accepted after this appointment was stored.
    pub needs_reconciliation: bool,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a direct status edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
}

impl StatusChange {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

impl Appointment {
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    pub fn cancelled_by(&self) -> Option<CancelledBy> {
        self.cancellation.map(|cancellation| cancellation.by)
    }

    pub fn is_admin_cancelled(&self) -> bool {
        self.status == AppointmentStatus::Cancelled
            && self.cancelled_by() == Some(CancelledBy::Admin)
    }

    pub fn cancel(&mut self, by: CancelledBy, now: DateTime<Utc>) {
        self.status = AppointmentStatus::Cancelled;
        self.cancellation = Some(Cancellation { by, at: now });
        self.touch(now);
    }

    /// Administrator status edit. Any target is accepted; setting the current
    /// status again leaves the appointment untouched.
    pub fn set_status_as_admin(
        &mut self,
        next: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> StatusChange {
        let change = StatusChange { from: self.status, to: next };
        if change.is_noop() {
            return change;
        }

        if next == AppointmentStatus::Cancelled {
            self.cancel(CancelledBy::Admin, now);
            return change;
        }

        self.status = next;
        self.cancellation = None;
        self.touch(now);
        change
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}
