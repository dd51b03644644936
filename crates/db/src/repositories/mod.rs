//! SQLite adapters for the booking repository ports.
//!
//! Timestamps are stored as RFC 3339 text with a fixed nanosecond precision
//! so that lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use salonbook_core::domain::quote::DesignId;
use salonbook_core::errors::RepositoryError;

pub mod appointment;
pub mod quote;
pub mod review;
pub mod user;

pub use appointment::SqlAppointmentRepository;
pub use quote::SqlQuoteRepository;
pub use review::SqlReviewRepository;
pub use user::SqlUserRepository;

pub(crate) fn storage(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(error.to_string())
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|error| RepositoryError::Decode(format!("column `{name}`: {error}")))
}

pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn encode_design_ids(ids: &[DesignId]) -> Result<String, RepositoryError> {
    let raw: Vec<&str> = ids.iter().map(|id| id.0.as_str()).collect();
    serde_json::to_string(&raw)
        .map_err(|error| RepositoryError::Storage(format!("encode design ids: {error}")))
}

pub(crate) fn decode_design_ids(column: &str, value: &str) -> Result<Vec<DesignId>, RepositoryError> {
    let raw: Vec<String> = serde_json::from_str(value).map_err(|error| {
        RepositoryError::Decode(format!("invalid json in `{column}`: {error}"))
    })?;
    Ok(raw.into_iter().map(DesignId).collect())
}
