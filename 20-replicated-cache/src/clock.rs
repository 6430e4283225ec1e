//! Local clock helpers.
//!
//! Entry versions are nanoseconds since the Unix epoch taken from the writing
//! node's own clock. Nothing here synchronizes clocks between nodes, so the
//! ordering of writes from different nodes is only as good as their skew.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Version stamp for a write originated on this node right now.
pub fn version_now() -> i64 {
    version_at(Utc::now())
}

/// Version stamp for an arbitrary instant.
///
/// Saturates for instants outside the ~584 year range an `i64` of
/// nanoseconds can hold.
pub fn version_at(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or(if at.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// The wall-clock instant a version was stamped at.
pub fn version_time(version: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(version)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("negative duration {0:?}")]
    Negative(String),
    #[error("duration {0:?} out of range")]
    Overflow(String),
    #[error("interval {0:?} must be greater than zero")]
    Zero(String),
}

/// Parses a duration such as `300ms`, `1.5h` or `2h45m10s`.
///
/// Accepted units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare
/// `0` is accepted without a unit. Negative durations are rejected because
/// every caller uses the result as a timeout, interval or TTL.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let mut rest = trimmed;
    if let Some(stripped) = rest.strip_prefix('-') {
        if stripped == "0" {
            return Ok(Duration::ZERO);
        }
        return Err(DurationParseError::Negative(input.to_string()));
    }
    rest = rest.strip_prefix('+').unwrap_or(rest);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(DurationParseError::Invalid(input.to_string()));
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(DurationParseError::Invalid(input.to_string()));
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationParseError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| DurationParseError::Overflow(input.to_string()))?
        };
        let mut component = whole
            .checked_mul(scale)
            .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;
        if !fraction.is_empty() {
            // Digits past nanosecond resolution cannot change the result.
            let digits = &fraction[..fraction.len().min(18)];
            let numerator: u128 = digits
                .parse()
                .map_err(|_| DurationParseError::Invalid(input.to_string()))?;
            let denominator = 10u128.pow(digits.len() as u32);
            component += numerator * scale / denominator;
        }

        total_nanos = total_nanos
            .checked_add(component)
            .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;
        rest = tail;
    }

    let nanos =
        u64::try_from(total_nanos).map_err(|_| DurationParseError::Overflow(input.to_string()))?;
    Ok(Duration::from_nanos(nanos))
}

/// Parses the period of a recurring task. Zero is rejected since a timer
/// cannot tick with a zero period.
pub fn parse_interval(input: &str) -> Result<Duration, DurationParseError> {
    let every = parse_duration(input)?;
    if every.is_zero() {
        return Err(DurationParseError::Zero(input.to_string()));
    }
    Ok(every)
}

/// Parses a `ttl` query value: a duration with units, or a whole number of
/// seconds. Empty input means "no TTL".
pub fn parse_ttl(input: &str) -> Result<Option<Duration>, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match parse_duration(trimmed) {
        Ok(ttl) => Ok(Some(ttl)),
        Err(DurationParseError::MissingUnit(_)) => {
            let secs: i64 = trimmed
                .parse()
                .map_err(|_| DurationParseError::Invalid(input.to_string()))?;
            let secs =
                u64::try_from(secs).map_err(|_| DurationParseError::Negative(input.to_string()))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(err) => Err(err),
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 60 * 60 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}
