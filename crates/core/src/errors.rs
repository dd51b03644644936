use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::appointment::AppointmentId;
use crate::domain::quote::{QuoteId, QuoteStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Quote,
    Appointment,
    Review,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Appointment => "appointment",
            Self::Review => "review",
            Self::User => "user",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid `{field}`: {message}")]
    Validation { field: String, message: String },
    #[error("{entity} `{id}` not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("not authorized: {reason}")]
    Unauthorized { reason: String },
    #[error("cannot {operation} {entity} in status `{status}`")]
    InvalidState { entity: EntityKind, status: String, operation: String },
    #[error("reschedule requires at least 3 days of notice ({days_remaining} day(s) remaining)")]
    RescheduleTooLate { days_remaining: i64 },
    #[error("requested date {requested} is outside the allowed window starting {earliest}")]
    RescheduleOutOfRange {
        requested: DateTime<Utc>,
        earliest: DateTime<Utc>,
        latest: Option<DateTime<Utc>>,
    },
    #[error("quote `{}` was already booked and can no longer be edited", .quote_id.0)]
    QuoteLocked { quote_id: QuoteId },
    #[error("quote `{}` is not ready for booking (status `{}`)", .quote_id.0, .status.as_str())]
    QuoteNotReady { quote_id: QuoteId, status: QuoteStatus },
    #[error("appointment `{}` already has a review", .appointment_id.0)]
    DuplicateReview { appointment_id: AppointmentId },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized { reason: reason.into() }
    }

    pub fn invalid_state(
        entity: EntityKind,
        status: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidState { entity, status: status.into(), operation: operation.into() }
    }

    /// Stable machine-readable class, used by the interface layer and in logs.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidState { .. } => "invalid_state",
            Self::RescheduleTooLate { .. } => "reschedule_too_late",
            Self::RescheduleOutOfRange { .. } => "reschedule_out_of_range",
            Self::QuoteLocked { .. } => "quote_locked",
            Self::QuoteNotReady { .. } => "quote_not_ready",
            Self::DuplicateReview { .. } => "duplicate_review",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` was modified concurrently (expected stored version {expected_version})")]
    VersionConflict { entity: EntityKind, id: String, expected_version: u32 },
    #[error("{entity} with key `{key}` already exists")]
    UniqueViolation { entity: EntityKind, key: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("concurrent modification: {0}")]
    Conflict(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::VersionConflict { .. } | RepositoryError::UniqueViolation { .. } => {
                Self::Conflict(value.to_string())
            }
            RepositoryError::Storage(_) | RepositoryError::Decode(_) => {
                Self::Persistence(value.to_string())
            }
        }
    }
}

impl ApplicationError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, error_class: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, error_class: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unauthorized { .. } => "You are not allowed to perform this action.",
            Self::NotFound { .. } => "The requested item could not be found.",
            Self::Conflict { .. } => {
                "The item changed while you were editing it. Reload and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

const UNASSIGNED: &str = "unassigned";

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = UNASSIGNED.to_owned();
        match value {
            ApplicationError::Domain(error) => {
                let message = error.to_string();
                let error_class = error.class().to_owned();
                match error {
                    DomainError::NotFound { .. } => Self::NotFound { message, correlation_id },
                    DomainError::Unauthorized { .. } => {
                        Self::Unauthorized { message, correlation_id }
                    }
                    DomainError::QuoteLocked { .. } | DomainError::DuplicateReview { .. } => {
                        Self::Conflict { message, error_class, correlation_id }
                    }
                    DomainError::Validation { .. }
                    | DomainError::InvalidState { .. }
                    | DomainError::RescheduleTooLate { .. }
                    | DomainError::RescheduleOutOfRange { .. }
                    | DomainError::QuoteNotReady { .. } => {
                        Self::BadRequest { message, error_class, correlation_id }
                    }
                }
            }
            ApplicationError::Conflict(message) => {
                Self::Conflict { message, error_class: "concurrent_update".to_owned(), correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::domain::appointment::AppointmentId;
    use crate::domain::quote::QuoteId;
    use crate::errors::{
        ApplicationError, DomainError, EntityKind, InterfaceError, RepositoryError,
    };

    #[test]
    fn validation_error_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::validation("service", "required"))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, ref error_class, .. }
                if correlation_id == "req-1" && error_class == "validation"
        ));
        assert_eq!(interface.status_code(), 400);
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn reschedule_window_errors_are_bad_requests() {
        let requested = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        let out_of_range = ApplicationError::from(DomainError::RescheduleOutOfRange {
            requested,
            earliest: requested,
            latest: None,
        })
        .into_interface("req-2");
        assert_eq!(out_of_range.status_code(), 400);

        let too_late = ApplicationError::from(DomainError::RescheduleTooLate { days_remaining: 2 })
            .into_interface("req-3");
        assert!(matches!(
            too_late,
            InterfaceError::BadRequest { ref error_class, .. } if error_class == "reschedule_too_late"
        ));
    }

    #[test]
    fn ownership_and_lookup_errors_map_to_401_and_404() {
        let unauthorized =
            ApplicationError::from(DomainError::unauthorized("not the owner")).into_interface("a");
        assert_eq!(unauthorized.status_code(), 401);

        let missing =
            ApplicationError::from(DomainError::not_found(EntityKind::Quote, "Q-404"))
                .into_interface("b");
        assert_eq!(missing.status_code(), 404);
        assert_eq!(missing.correlation_id(), "b");
    }

    #[test]
    fn lock_and_duplicate_errors_map_to_conflict() {
        let locked = ApplicationError::from(DomainError::QuoteLocked {
            quote_id: QuoteId("Q-1".to_owned()),
        })
        .into_interface("c");
        assert_eq!(locked.status_code(), 409);

        let duplicate = ApplicationError::from(DomainError::DuplicateReview {
            appointment_id: AppointmentId("A-1".to_owned()),
        })
        .into_interface("d");
        assert!(matches!(
            duplicate,
            InterfaceError::Conflict { ref error_class, .. } if error_class == "duplicate_review"
        ));
    }

    #[test]
    fn repository_errors_split_into_conflict_and_persistence() {
        let conflict = ApplicationError::from(RepositoryError::VersionConflict {
            entity: EntityKind::Appointment,
            id: "A-1".to_owned(),
            expected_version: 3,
        });
        assert!(matches!(conflict, ApplicationError::Conflict(_)));
        assert_eq!(conflict.into_interface("e").status_code(), 409);

        let storage = ApplicationError::from(RepositoryError::Storage("disk full".to_owned()));
        assert!(matches!(storage, ApplicationError::Persistence(_)));
        assert_eq!(
            storage.into_interface("f").user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("bad offset".to_owned()).into_interface("g");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
