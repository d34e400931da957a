//! Value parsers shared by the CLI surface and declarative fields.

use std::time::Duration;

use crate::error::ConfigError;
use crate::test::Status;

/// Parse a status severity name (`notrun` through `bogus`).
///
/// # Errors
///
/// Unknown status names.
pub fn parse_status(input: &str) -> Result<Status, ConfigError> {
    input.parse()
}

/// Parse `name=value` into a variable definition.
///
/// # Errors
///
/// Input without `=` or with an empty name.
pub fn parse_key_value(input: &str) -> Result<(String, String), ConfigError> {
    input
        .split_once('=')
        .map(|(name, value)| (name.trim().to_owned(), value.to_owned()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| ConfigError::InvalidVariable {
            input: input.to_owned(),
        })
}

/// Parse durations like `250ms`, `10s`, `5m`, `2h`, `1d`; a bare number
/// means seconds.
///
/// # Errors
///
/// Empty input, unparseable numbers, unknown units, negative or
/// non-finite values.
#[expect(clippy::float_arithmetic, reason = "unit conversion")]
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDuration {
            input: input.to_owned(),
            reason: "empty".to_owned(),
        });
    }
    let split = trimmed
        .find(|ch: char| !ch.is_ascii_digit() && ch != '.')
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number.parse().map_err(|err: std::num::ParseFloatError| {
        ConfigError::InvalidDuration {
            input: input.to_owned(),
            reason: err.to_string(),
        }
    })?;
    let seconds = match unit.trim() {
        "" | "s" => value,
        "ms" => value / 1_000.0,
        "m" => value * 60.0,
        "h" => value * 3_600.0,
        "d" => value * 86_400.0,
        other => {
            return Err(ConfigError::InvalidDuration {
                input: input.to_owned(),
                reason: format!("unknown unit '{other}'"),
            });
        }
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ConfigError::InvalidDuration {
            input: input.to_owned(),
            reason: "out of range".to_owned(),
        });
    }
    Ok(Duration::from_secs_f64(seconds))
}
