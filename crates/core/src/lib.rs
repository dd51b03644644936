pub mod auth;
pub mod clock;
pub mod config;
pub mod datetime;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod notify;
pub mod repository;
pub mod window;

pub use auth::{Actor, AuthorizationGuard, Capability, Role};
pub use clock::{Clock, FixedClock, SystemClock};
pub use datetime::DateFormatter;
pub use domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, Cancellation, CancelledBy, StatusChange,
};
pub use domain::quote::{DesignId, Quote, QuoteId, QuoteResponse, QuoteStatus};
pub use domain::review::{Review, ReviewId};
pub use domain::user::{AccountRole, User, UserId};
pub use errors::{
    ApplicationError, DomainError, EntityKind, InterfaceError, RepositoryError,
};
pub use lifecycle::{
    AppointmentView, BookingEngine, BookingOutcome, BookingPorts, BookingRequest, QuoteRequest,
    ReconciliationMarker, RescheduleOutcome, ReviewSubmission, StatusUpdate,
};
pub use notify::{
    InMemoryNotifier, LogNotifier, Notification, NotificationEvent, Notifier, NotifyError,
};
pub use window::{DateWindowPolicy, RescheduleWindow, WindowTier};
