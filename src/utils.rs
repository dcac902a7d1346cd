//! Shared helpers for phone keys, timestamps, hashing and lead ids.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Minimum normalized phone length that participates in deduplication
pub const MIN_PHONE_KEY_DIGITS: usize = 9;

/// Sheet timestamp layout, e.g. `03/14/2026, 09:05:07 PM`
pub const SHEET_TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

const LEAD_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Strip everything but ASCII digits.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Dedup key for a phone, `None` when it is too short to be trusted.
#[must_use]
pub fn phone_key(raw: &str) -> Option<String> {
    let digits = normalize_phone(raw);
    (digits.len() >= MIN_PHONE_KEY_DIGITS).then_some(digits)
}

/// Lowercase hex SHA-256 of the UTF-8 input.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// `LEAD-<epoch millis>-<5 uppercase base36 chars>`
#[must_use]
pub fn generate_lead_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| LEAD_ID_ALPHABET[rng.gen_range(0..LEAD_ID_ALPHABET.len())] as char)
        .collect();
    format!("LEAD-{}-{}", now.timestamp_millis(), suffix)
}

/// Render a timestamp the way the sheet stores it.
#[must_use]
pub fn format_sheet_timestamp<Tz: TimeZone>(at: &DateTime<Tz>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format(SHEET_TIMESTAMP_FORMAT).to_string()
}

/// Parse a sheet timestamp back into an instant.
///
/// Accepts the sheet layout (interpreted in `offset`) as well as RFC 3339.
#[must_use]
pub fn parse_sheet_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(raw, SHEET_TIMESTAMP_FORMAT).ok()?;
    offset.from_local_datetime(&naive).single()
}
