//! Per-field validation helpers

use crate::error::ValidationError;
use std::ops::RangeInclusive;

type Result = std::result::Result<(), ValidationError>;

pub fn in_range(field: &'static str, value: i64, range: RangeInclusive<i64>) -> Result {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!(
                "must be between {} and {}, got {}",
                range.start(),
                range.end(),
                value
            ),
        ))
    }
}

pub fn one_of(field: &'static str, value: &str, allowed: &[&str]) -> Result {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("must be one of {:?}, got {:?}", allowed, value),
        ))
    }
}

pub fn not_empty(field: &'static str, value: &str) -> Result {
    if value.trim().is_empty() {
        Err(ValidationError::new(field, "must not be empty"))
    } else {
        Ok(())
    }
}

pub fn max_len(field: &'static str, value: &str, max: usize) -> Result {
    let len = value.chars().count();
    if len > max {
        Err(ValidationError::new(
            field,
            format!("must be at most {} characters, got {}", max, len),
        ))
    } else {
        Ok(())
    }
}

/// Fails when both fields are set
pub fn exclusive(
    field: &'static str,
    is_set: bool,
    other: &'static str,
    other_set: bool,
) -> Result {
    if is_set && other_set {
        Err(ValidationError::conflict(field, other))
    } else {
        Ok(())
    }
}
