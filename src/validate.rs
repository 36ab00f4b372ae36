//! Length checks for user-written text.

use crate::error::{AppError, AppResult};

pub const TITLE_RANGE: (usize, usize) = (3, 200);
pub const BODY_RANGE: (usize, usize) = (1, 10_000);

/// Trim `value` and require `min..=max` characters.
pub fn text(field: &str, value: &str, (min, max): (usize, usize)) -> AppResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(AppError::validation(format!(
            "{} must be {} to {} characters",
            field, min, max
        )));
    }
    Ok(trimmed.to_string())
}

pub fn title(value: &str) -> AppResult<String> {
    text("title", value, TITLE_RANGE)
}

pub fn body(value: &str) -> AppResult<String> {
    text("body", value, BODY_RANGE)
}
