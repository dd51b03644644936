use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::auth::Actor;
use crate::clock::{Clock, FixedClock};
use crate::domain::appointment::{Appointment, AppointmentStatus};
use crate::domain::quote::{Quote, QuoteResponse};
use crate::domain::user::{AccountRole, User, UserId};
use crate::notify::{InMemoryNotifier, Notifier};

use super::{BookingEngine, BookingPorts, BookingRequest, QuoteRequest};

pub(crate) struct Harness {
    pub engine: BookingEngine,
    pub ports: BookingPorts,
    pub clock: FixedClock,
    pub notifier: InMemoryNotifier,
    pub client: Actor,
    pub admin: Actor,
}

impl Harness {
    pub fn new() -> Self {
        let notifier = InMemoryNotifier::default();
        Self::with(BookingPorts::in_memory(), notifier.clone(), Arc::new(notifier))
    }

    pub fn with(
        ports: BookingPorts,
        notifier: InMemoryNotifier,
        delivery: Arc<dyn Notifier>,
    ) -> Self {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap());
        let engine = BookingEngine::new(ports.clone(), delivery).with_clock(Arc::new(clock.clone()));
        Self {
            engine,
            ports,
            clock,
            notifier,
            client: Actor::client("client-1"),
            admin: Actor::admin("admin-1"),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn requested_quote(&self) -> Quote {
        self.engine
            .request_quote(
                &self.client,
                QuoteRequest {
                    service: "Gel manicure".to_string(),
                    notes: "Almond shape".to_string(),
                    design_ids: Vec::new(),
                },
            )
            .await
            .expect("request quote")
    }

    pub async fn quoted_quote(&self) -> Quote {
        let quote = self.requested_quote().await;
        self.engine
            .respond_to_quote(
                &self.admin,
                &quote.id,
                QuoteResponse { price: Some(Decimal::new(300, 0)), ..QuoteResponse::default() },
            )
            .await
            .expect("respond")
    }

    pub fn booking_for(&self, quote: &Quote, date: DateTime<Utc>) -> BookingRequest {
        BookingRequest {
            quote_id: quote.id.clone(),
            requested_date: Some(date.to_rfc3339()),
            client_phone: "+34 600 000 000".to_string(),
        }
    }

    /// Books an appointment `days_out` days from now for the default client.
    pub async fn book(&self, days_out: i64) -> Appointment {
        let quote = self.quoted_quote().await;
        let request = self.booking_for(&quote, self.now() + Duration::days(days_out));
        self.engine
            .create_appointment(&self.client, request)
            .await
            .expect("book appointment")
            .appointment
    }

    pub async fn book_with_status(&self, days_out: i64, status: AppointmentStatus) -> Appointment {
        let appointment = self.book(days_out).await;
        if status == AppointmentStatus::Pending {
            return appointment;
        }
        self.engine
            .set_appointment_status(&self.admin, &appointment.id, status)
            .await
            .expect("set status")
            .appointment
    }

    pub async fn seed_users(&self) {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        for (id, role, offset_days) in [
            ("client-1", AccountRole::Client, -30),
            ("admin-1", AccountRole::Admin, 0),
            ("admin-2", AccountRole::Admin, 31),
        ] {
            self.ports
                .users
                .save(User {
                    id: UserId(id.to_string()),
                    name: id.to_string(),
                    email: format!("{id}@example.com"),
                    role,
                    created_at: base + Duration::days(offset_days),
                })
                .await
                .expect("seed user");
        }
    }
}
