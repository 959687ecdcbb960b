//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Replace underscores and hyphens with spaces: `fixed_amount` -> `fixed amount`.
#[must_use]
pub fn humanize_text(value: &str) -> String {
    value.replace(['_', '-'], " ")
}

/// Template form of [`humanize_text`].
///
/// Usage in templates: `{{ value|humanize }}`
#[askama::filter_fn]
pub fn humanize(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(humanize_text(&value.to_string()))
}
