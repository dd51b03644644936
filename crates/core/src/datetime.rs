use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use crate::errors::DomainError;

pub const DEFAULT_DISPLAY_FORMAT: &str = "%A, %-d %B %Y %H:%M";

const LOCAL_INPUT_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn is_valid_display_format(pattern: &str) -> bool {
    !pattern.trim().is_empty() && StrftimeItems::new(pattern).all(|item| item != Item::Error)
}

/// Parses client-supplied dates and renders dates for notifications, in the salon's offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateFormatter {
    offset: FixedOffset,
    pattern: String,
}

impl Default for DateFormatter {
    fn default() -> Self {
        Self { offset: Utc.fix(), pattern: DEFAULT_DISPLAY_FORMAT.to_string() }
    }
}

impl DateFormatter {
    pub fn new(utc_offset_minutes: i32, pattern: impl Into<String>) -> Option<Self> {
        let pattern = pattern.into();
        if !is_valid_display_format(&pattern) {
            return None;
        }
        let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
        Some(Self { offset, pattern })
    }

    pub fn format(&self, value: DateTime<Utc>) -> String {
        value.with_timezone(&self.offset).format(&self.pattern).to_string()
    }

    /// Accepts RFC 3339, or an offset-less local date-time (what a `datetime-local`
    /// input submits) read in the configured offset.
    pub fn parse_input(
        &self,
        field: &str,
        raw: Option<&str>,
    ) -> Result<DateTime<Utc>, DomainError> {
        let raw = raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DomainError::validation(field, "a date is required"))?;

        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }

        LOCAL_INPUT_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .and_then(|naive| self.offset.from_local_datetime(&naive).single())
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| DomainError::validation(field, format!("`{raw}` is not a valid date")))
    }
}
