//! Phone number normalization and validation for kiosk identification.
//!
//! A phone number is the customer's lookup key. Input is reduced to digits
//! and must be a plausible real 10-digit number: obvious test entries
//! (a single repeated digit, sequential runs) are rejected up front so they
//! never reach the backend.

use crate::error::{RewardsError, RewardsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits in a valid phone number.
pub const PHONE_DIGITS: usize = 10;

/// A validated, digits-only phone number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize raw input to digits and validate it.
    pub fn parse(raw: &str) -> RewardsResult<Self> {
        let digits = normalize_digits(raw);
        if let Some(reason) = rejection_reason(&digits) {
            return Err(RewardsError::validation(format!(
                "Please enter a valid, real 10-digit phone number ({reason})"
            )));
        }
        Ok(PhoneNumber(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `(XXX) XXX-XXXX` form shown on the kiosk.
    pub fn display(&self) -> String {
        format_partial(&self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = RewardsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PhoneNumber::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

/// Strip everything but ASCII digits.
pub fn normalize_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a partially typed number the way the keypad display does:
/// `(555`, `(555) 12`, `(555) 123-4567`. Extra digits are dropped.
pub fn format_partial(raw: &str) -> String {
    let digits: String = normalize_digits(raw).chars().take(PHONE_DIGITS).collect();
    match digits.len() {
        0 => String::new(),
        1..=3 => format!("({digits}"),
        4..=6 => format!("({}) {}", &digits[..3], &digits[3..]),
        _ => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

fn rejection_reason(digits: &str) -> Option<&'static str> {
    if digits.len() != PHONE_DIGITS {
        return Some("wrong length");
    }
    let bytes = digits.as_bytes();
    if bytes.iter().all(|b| *b == bytes[0]) {
        return Some("repeated digit");
    }
    if digits == "1234567890" || is_step_run(bytes, 1) || is_step_run(bytes, -1) {
        return Some("sequential digits");
    }
    None
}

fn is_step_run(bytes: &[u8], step: i8) -> bool {
    bytes
        .windows(2)
        .all(|w| w[1] as i16 - w[0] as i16 == step as i16)
}
