//! Parsing helpers for raw environment values.

use crate::error::{ConfigError, ConfigResult};

fn invalid(field: &'static str, raw: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidField {
        field,
        value: Some(raw.to_string()),
        reason,
    }
}

/// Parse an unsigned integer that must be at least `min`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when `raw` is not an integer or is below `min`.
pub fn parse_u64_at_least(field: &'static str, raw: &str, min: u64) -> ConfigResult<u64> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid(field, raw, "must be a non-negative integer"))?;
    if value < min {
        return Err(invalid(field, raw, "below minimum"));
    }
    Ok(value)
}

/// Parse a `usize` that must be at least `min`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when `raw` is not an integer or is below `min`.
pub fn parse_usize_at_least(field: &'static str, raw: &str, min: usize) -> ConfigResult<usize> {
    let value = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid(field, raw, "must be a non-negative integer"))?;
    if value < min {
        return Err(invalid(field, raw, "below minimum"));
    }
    Ok(value)
}

/// Parse a ratio in `0.0..=1.0`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when `raw` is not a finite number in range.
pub fn parse_unit_interval(field: &'static str, raw: &str) -> ConfigResult<f64> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| invalid(field, raw, "must be a number"))?;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, raw, "must be between 0 and 1"));
    }
    Ok(value)
}

/// Require a non-blank string.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when `raw` is empty after trimming.
pub fn require_non_empty(field: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidField {
            field,
            value: None,
            reason: "must not be empty",
        });
    }
    Ok(trimmed.to_string())
}

/// Require a non-blank URL and drop trailing slashes.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when `raw` is empty or lacks an http(s) scheme.
pub fn parse_base_url(field: &'static str, raw: &str) -> ConfigResult<String> {
    let value = require_non_empty(field, raw)?;
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(invalid(field, raw, "must start with http:// or https://"));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Accept only the supported log formats.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for anything other than `json` or `pretty`.
pub fn parse_log_format(field: &'static str, raw: &str) -> ConfigResult<String> {
    let value = raw.trim().to_ascii_lowercase();
    match value.as_str() {
        "json" | "pretty" => Ok(value),
        _ => Err(invalid(field, raw, "must be json or pretty")),
    }
}
