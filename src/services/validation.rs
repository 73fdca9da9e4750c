//! Bucket name rules.
//!
//! Rules are checked in a fixed order and the first failing rule decides the
//! reported reason:
//! - 3 to 63 characters drawn from lowercase letters, digits, dots and hyphens
//! - not formatted like a dotted-quad address (`1.2.3.4`)
//! - no leading or trailing hyphen
//! - no consecutive hyphens

use std::fmt;

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// The first rule a rejected bucket name broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameViolation {
    CharsetOrLength,
    AddressLike,
    HyphenAtEdge,
    ConsecutiveHyphens,
}

impl NameViolation {
    pub fn reason(&self) -> &'static str {
        match self {
            NameViolation::CharsetOrLength => "invalid characters or length",
            NameViolation::AddressLike => "must not look like an address",
            NameViolation::HyphenAtEdge => "must not start or end with a hyphen",
            NameViolation::ConsecutiveHyphens => "must not contain consecutive hyphens",
        }
    }
}

impl fmt::Display for NameViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Validate a proposed bucket name. Pure; performs no I/O.
pub fn validate_bucket_name(name: &str) -> Result<(), NameViolation> {
    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len)
        || !name
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-'))
    {
        return Err(NameViolation::CharsetOrLength);
    }

    if is_dotted_quad(name) {
        return Err(NameViolation::AddressLike);
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(NameViolation::HyphenAtEdge);
    }

    if name.contains("--") {
        return Err(NameViolation::ConsecutiveHyphens);
    }

    Ok(())
}

/// Four non-empty runs of digits separated by single dots. Segment values are
/// not range-checked, so `999.1.1.1` counts as address-like too.
fn is_dotted_quad(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
}
