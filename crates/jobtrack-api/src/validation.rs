//! Field validators. Each one records its messages into a [`FieldErrors`]
//! under the field name and returns whether the value passed.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::FieldErrors;

pub const REQUIRED: &str = "This field is required.";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{7,14}$").expect("valid regex"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[A-Za-z0-9.-]+(:\d+)?(/\S*)?$").expect("valid regex"));

pub fn required(errors: &mut FieldErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        return false;
    }
    true
}

pub fn max_len(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> bool {
    let n = value.chars().count();
    if n > max {
        errors.add(
            field,
            format!("Ensure this value has at most {max} characters (it has {n})."),
        );
        return false;
    }
    true
}

/// Required and at most `max` characters.
pub fn text(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> bool {
    required(errors, field, value) && max_len(errors, field, value, max)
}

/// Empty is fine; anything else is length-checked.
pub fn optional_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> bool {
    match value {
        Some(v) => max_len(errors, field, v, max),
        None => true,
    }
}

pub fn username(errors: &mut FieldErrors, value: &str) -> bool {
    if !text(errors, "username", value, 150) {
        return false;
    }
    if !USERNAME_RE.is_match(value) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, \
             and @/./+/-/_ characters.",
        );
        return false;
    }
    true
}

pub fn email(errors: &mut FieldErrors, field: &str, value: &str) -> bool {
    if !text(errors, field, value, 254) {
        return false;
    }
    if !EMAIL_RE.is_match(value.trim()) {
        errors.add(field, "Enter a valid email address.");
        return false;
    }
    true
}

/// Strip the separators people usually type into phone numbers.
pub fn normalize_phone(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect()
}

/// Optional E.164-style phone number. Returns the normalized number when valid.
pub fn phone(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
    let normalized = normalize_phone(raw);
    if PHONE_RE.is_match(&normalized) {
        Some(normalized)
    } else {
        errors.add(field, "Enter a valid phone number (e.g. +48123456789).");
        None
    }
}

pub fn url(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> bool {
    if !text(errors, field, value, max) {
        return false;
    }
    if !URL_RE.is_match(value.trim()) {
        errors.add(field, "Enter a valid URL.");
        return false;
    }
    true
}

/// Parse a `YYYY-MM-DD` date, recording an error on failure.
pub fn date(errors: &mut FieldErrors, field: &str, value: &str) -> Option<NaiveDate> {
    if !required(errors, field, value) {
        return None;
    }
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.add(field, "Enter a valid date.");
            None
        }
    }
}

/// Trim, and map empty strings to `None`.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
