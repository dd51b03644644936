use chrono::{DateTime, Utc};
use serde_json::json;

use salonbook_core::config::{AppConfig, LoadOptions};
use salonbook_core::{DateFormatter, DateWindowPolicy, DomainError};

use crate::commands::CommandResult;

/// Previews the reschedule window for `original`, optionally checking `candidate`.
pub fn run(original: &str, candidate: Option<&str>, now: Option<&str>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "window",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    let formatter = match config.date_formatter() {
        Ok(formatter) => formatter,
        Err(error) => return CommandResult::failure("window", "config_validation", error.to_string(), 2),
    };

    let (original, now, candidate) = match parse_inputs(&formatter, original, candidate, now) {
        Ok(values) => values,
        Err(error) => return domain_failure(&error),
    };

    let window = match DateWindowPolicy::default().window(original, now) {
        Ok(window) => window,
        Err(error) => return domain_failure(&error),
    };

    let mut details = json!({
        "tier": window.tier,
        "days_remaining": window.days_remaining,
        "earliest": window.earliest,
        "earliest_inclusive": window.earliest_inclusive,
        "latest": window.latest,
        "earliest_display": formatter.format(window.earliest),
        "latest_display": window.latest.map(|latest| formatter.format(latest)),
    });

    let Some(candidate) = candidate else {
        return CommandResult::success_with_details(
            "window",
            format!("{} day(s) remaining", window.days_remaining),
            Some(details),
        );
    };

    details["candidate"] = json!(candidate);
    match window.check(candidate) {
        Ok(()) => {
            details["candidate_allowed"] = json!(true);
            CommandResult::success_with_details("window", "candidate date is allowed", Some(details))
        }
        Err(error) => domain_failure(&error),
    }
}

fn parse_inputs(
    formatter: &DateFormatter,
    original: &str,
    candidate: Option<&str>,
    now: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>, Option<DateTime<Utc>>), DomainError> {
    let original = formatter.parse_input("original", Some(original))?;
    let now = match now {
        Some(raw) => formatter.parse_input("now", Some(raw))?,
        None => Utc::now(),
    };
    let candidate = candidate.map(|raw| formatter.parse_input("candidate", Some(raw))).transpose()?;
    Ok((original, now, candidate))
}

fn domain_failure(error: &DomainError) -> CommandResult {
    CommandResult::failure("window", error.class(), error.to_string(), 6)
}
