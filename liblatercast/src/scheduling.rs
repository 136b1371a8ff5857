//! Schedule-time parsing
//!
//! Normalizes the publish time an owner supplies into an absolute UTC
//! instant at draft creation, so everything downstream compares plain
//! timestamps.

use crate::{LatercastError, Result};
use chrono::{DateTime, Duration, Utc};

/// Parse a schedule string into a DateTime
///
/// Supports multiple formats:
/// - Absolute times: "2025-11-20T15:00:00Z" (RFC 3339)
/// - Relative durations: "1h", "30m", "2d"
/// - Natural language: "tomorrow", "next friday 10am"
///
/// # Errors
///
/// Returns an error if the time format is invalid or cannot be parsed.
pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LatercastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    // Absolute RFC 3339 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Then relative durations
    if let Ok(duration) = parse_duration(input) {
        return Ok(Utc::now() + duration);
    }

    // Then natural language
    if let Ok(dt) = parse_natural_language(input) {
        return Ok(dt);
    }

    Err(LatercastError::InvalidInput(format!(
        "Could not parse schedule string: {}",
        input
    )))
}

/// Parse a duration string into a chrono::Duration
fn parse_duration(input: &str) -> Result<Duration> {
    // humantime handles simple formats like "1h", "30m"
    if let Ok(std_duration) = humantime::parse_duration(input) {
        let seconds = std_duration.as_secs() as i64;
        return Duration::try_seconds(seconds)
            .ok_or_else(|| LatercastError::InvalidInput("Duration out of range".to_string()));
    }

    Err(LatercastError::InvalidInput(format!(
        "Could not parse duration: {}",
        input
    )))
}

/// Parse natural language time expression
fn parse_natural_language(input: &str) -> Result<DateTime<Utc>> {
    chrono_english::parse_date_string(input, Utc::now(), chrono_english::Dialect::Us)
        .map_err(|e| LatercastError::InvalidInput(format!("Could not parse time: {}", e)))
}
