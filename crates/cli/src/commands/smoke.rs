use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use salonbook_core::{
    Actor, AppointmentStatus, BookingEngine, BookingRequest, LogNotifier, QuoteRequest,
    QuoteResponse, ReviewSubmission,
};
use salonbook_db::{connect_with_settings, migrations, sql_ports};

use crate::commands::{current_thread_runtime, CommandResult};

#[derive(Debug, Serialize)]
struct SmokeStep {
    name: &'static str,
    elapsed_ms: u128,
}

/// Drives one quote through booking, reschedule, completion and review on an
/// in-memory database. The configured database is never touched.
pub fn run() -> CommandResult {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(message) => return CommandResult::failure("smoke", "runtime_init", message, 3),
    };

    match runtime.block_on(run_flow()) {
        Ok(steps) => CommandResult::success_with_details(
            "smoke",
            format!("{} lifecycle steps passed", steps.len()),
            serde_json::to_value(&steps).ok(),
        ),
        Err((step, message)) => {
            tracing::error!(event_name = "system.smoke.failed", step, %message, "smoke step failed");
            CommandResult::failure("smoke", step, message, 7)
        }
    }
}

async fn run_flow() -> Result<Vec<SmokeStep>, (&'static str, String)> {
    let mut steps = Vec::new();
    let mut timer = Instant::now();
    let mut record = |name: &'static str, steps: &mut Vec<SmokeStep>| {
        steps.push(SmokeStep { name, elapsed_ms: timer.elapsed().as_millis() });
        timer = Instant::now();
    };

    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| ("db_connectivity", error.to_string()))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string()))?;
    record("migrate", &mut steps);

    let engine = BookingEngine::new(sql_ports(&pool), Arc::new(LogNotifier));
    let client = Actor::client("smoke-client");
    let admin = Actor::admin("smoke-admin");

    let quote = engine
        .request_quote(
            &client,
            QuoteRequest { service: "Smoke manicure".to_string(), ..QuoteRequest::default() },
        )
        .await
        .map_err(|error| ("request_quote", error.to_string()))?;
    engine
        .respond_to_quote(
            &admin,
            &quote.id,
            QuoteResponse { price: Some(Decimal::new(100, 0)), ..QuoteResponse::default() },
        )
        .await
        .map_err(|error| ("respond_to_quote", error.to_string()))?;
    record("quote", &mut steps);

    let now = Utc::now();
    let booking = engine
        .create_appointment(
            &client,
            BookingRequest {
                quote_id: quote.id.clone(),
                requested_date: Some((now + Duration::days(20)).to_rfc3339()),
                client_phone: "+34 600 000 000".to_string(),
            },
        )
        .await
        .map_err(|error| ("create_appointment", error.to_string()))?;
    record("book", &mut steps);

    let new_date = (now + Duration::days(12)).to_rfc3339();
    engine
        .reschedule(&client, &booking.appointment.id, Some(new_date.as_str()))
        .await
        .map_err(|error| ("reschedule", error.to_string()))?;
    record("reschedule", &mut steps);

    engine
        .set_appointment_status(&admin, &booking.appointment.id, AppointmentStatus::Completed)
        .await
        .map_err(|error| ("complete", error.to_string()))?;
    let review = engine
        .submit_review(
            &client,
            ReviewSubmission {
                appointment_id: booking.appointment.id.clone(),
                rating: 5,
                comment: "Smoke test review".to_string(),
            },
        )
        .await
        .map_err(|error| ("submit_review", error.to_string()))?;
    engine
        .approve_review(&admin, &review.id)
        .await
        .map_err(|error| ("approve_review", error.to_string()))?;
    record("review", &mut steps);

    pool.close().await;
    Ok(steps)
}
