//! # PII and Pinpointing Detection
//!
//! Pattern matching shared by the pii-absence, no-pinpointing, and
//! prohibited-fields gates, plus the scrub operation operators use to
//! salvage an otherwise-publishable candidate.
//!
//! Detection and scrubbing use the same pattern set, so a scrubbed text can
//! never fail the pii-absence gate again.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Replacement token for scrubbed matches.
pub const REDACTION_PLACEHOLDER: &str = "[redacted]";

/// Structured-field keys that unambiguously name a person or device.
pub const PROHIBITED_FIELD_KEYS: &[&str] = &[
    "name",
    "full_name",
    "username",
    "handle",
    "user_id",
    "person",
    "contact",
    "phone",
    "phone_number",
    "email",
    "device_id",
    "imei",
    "mac_address",
    "ip_address",
    "license_plate",
];

/// Structured-field keys carrying finer-than-postal-area location.
const ADDRESS_FIELD_KEYS: &[&str] = &[
    "address",
    "street",
    "street_address",
    "facility",
    "facility_name",
    "building",
    "venue",
];

const LATITUDE_KEYS: &[&str] = &["latitude", "lat"];
const LONGITUDE_KEYS: &[&str] = &["longitude", "lon", "lng"];

static SSN_RE: OnceLock<Regex> = OnceLock::new();
static PHONE_RE: OnceLock<Regex> = OnceLock::new();
static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static STREET_RE: OnceLock<Regex> = OnceLock::new();

fn ssn_re() -> &'static Regex {
    SSN_RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern compiles"))
}

fn phone_re() -> &'static Regex {
    PHONE_RE.get_or_init(|| {
        Regex::new(r"(?:\+?1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b")
            .expect("phone pattern compiles")
    })
}

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
            .expect("email pattern compiles")
    })
}

fn street_re() -> &'static Regex {
    STREET_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b\d{1,5}\s+(?:[A-Za-z0-9.'-]+\s+){0,3}(?:Street|St|Avenue|Ave|Boulevard|Blvd|Road|Rd|Lane|Ln|Drive|Dr|Court|Ct|Place|Pl|Way)\b",
        )
        .expect("street pattern compiles")
    })
}

/// Names of the PII pattern classes found in a text.
pub fn pii_matches(text: &str) -> Vec<&'static str> {
    let mut found = Vec::new();
    if ssn_re().is_match(text) {
        found.push("ssn");
    }
    if phone_re().is_match(text) {
        found.push("phone");
    }
    if email_re().is_match(text) {
        found.push("email");
    }
    if street_re().is_match(text) {
        found.push("street_address");
    }
    found
}

/// Whether any PII pattern matches the text.
pub fn contains_pii(text: &str) -> bool {
    !pii_matches(text).is_empty()
}

/// Redact every PII match to the fixed placeholder.
///
/// Idempotent: the placeholder matches none of the patterns, so scrubbing a
/// scrubbed text is a no-op.
pub fn scrub_pii(text: &str) -> String {
    let scrubbed = ssn_re().replace_all(text, REDACTION_PLACEHOLDER);
    let scrubbed = phone_re().replace_all(&scrubbed, REDACTION_PLACEHOLDER);
    let scrubbed = email_re().replace_all(&scrubbed, REDACTION_PLACEHOLDER);
    let scrubbed = street_re().replace_all(&scrubbed, REDACTION_PLACEHOLDER);
    scrubbed.into_owned()
}

/// Whether the free text contains a street-address pattern.
pub fn text_has_address(text: &str) -> bool {
    street_re().is_match(text)
}

/// First pinpointing violation in the structured fields, if any.
///
/// Pinpointing is anything finer than postal-area granularity: an address
/// or facility key, or a usable lat-lon pair.
pub fn pinpointing_violation(fields: &Map<String, Value>) -> Option<String> {
    for key in fields.keys() {
        let lowered = key.to_ascii_lowercase();
        if ADDRESS_FIELD_KEYS.contains(&lowered.as_str()) {
            return Some(format!("structured field '{key}'"));
        }
        if lowered == "coordinates" {
            return Some(format!("structured field '{key}'"));
        }
    }
    let has_lat = fields
        .keys()
        .any(|k| LATITUDE_KEYS.contains(&k.to_ascii_lowercase().as_str()));
    let has_lon = fields
        .keys()
        .any(|k| LONGITUDE_KEYS.contains(&k.to_ascii_lowercase().as_str()));
    if has_lat && has_lon {
        return Some("lat-lon pair".to_string());
    }
    None
}

/// First deny-listed key present in the structured fields, if any.
pub fn prohibited_field(fields: &Map<String, Value>) -> Option<String> {
    fields
        .keys()
        .find(|k| PROHIBITED_FIELD_KEYS.contains(&k.to_ascii_lowercase().as_str()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_ssn_detection() {
        assert_eq!(pii_matches("SSN is 123-45-6789"), vec!["ssn"]);
        assert!(pii_matches("order 123-456-789").is_empty());
    }

    #[test]
    fn test_phone_detection() {
        assert!(contains_pii("Call 555-123-4567"));
        assert!(contains_pii("Call (555) 123-4567 now"));
        assert!(contains_pii("Call +1 555 123 4567"));
        assert!(!contains_pii("route 66 closed"));
    }

    #[test]
    fn test_email_detection() {
        assert!(contains_pii("reach me at someone@example.org"));
        assert!(!contains_pii("meet at the office"));
    }

    #[test]
    fn test_street_address_detection() {
        assert!(text_has_address("fire near 42 Elm Street yesterday"));
        assert!(text_has_address("1600 Pennsylvania Ave"));
        assert!(!text_has_address("heavy traffic downtown"));
    }

    #[test]
    fn test_scrub_is_idempotent() {
        let text = "Call 555-123-4567 or mail a@b.com, SSN 123-45-6789";
        let once = scrub_pii(text);
        assert!(!contains_pii(&once));
        assert!(once.contains(REDACTION_PLACEHOLDER));
        assert_eq!(scrub_pii(&once), once);
    }

    #[test]
    fn test_scrub_leaves_clean_text_alone() {
        let text = "crowd gathering near the central plaza";
        assert_eq!(scrub_pii(text), text);
    }

    #[test]
    fn test_pinpointing_address_key() {
        let f = fields(json!({"address": "42 Elm St"}));
        assert!(pinpointing_violation(&f).is_some());
    }

    #[test]
    fn test_pinpointing_latlon_pair() {
        let f = fields(json!({"latitude": 52.5, "longitude": 13.4}));
        assert_eq!(
            pinpointing_violation(&f).as_deref(),
            Some("lat-lon pair")
        );
        // Latitude alone is not a usable pinpoint.
        let partial = fields(json!({"latitude": 52.5}));
        assert!(pinpointing_violation(&partial).is_none());
    }

    #[test]
    fn test_pinpointing_facility() {
        let f = fields(json!({"facility_name": "Northside Clinic"}));
        assert!(pinpointing_violation(&f).is_some());
    }

    #[test]
    fn test_clean_structured_fields() {
        let f = fields(json!({"topic": "transport", "signal_kind": "closure"}));
        assert!(pinpointing_violation(&f).is_none());
        assert!(prohibited_field(&f).is_none());
    }

    #[test]
    fn test_prohibited_field_keys() {
        let f = fields(json!({"device_id": "abc"}));
        assert_eq!(prohibited_field(&f).as_deref(), Some("device_id"));
        let f = fields(json!({"Username": "someone"}));
        assert_eq!(prohibited_field(&f).as_deref(), Some("Username"));
    }

    #[test]
    fn test_placeholder_matches_nothing() {
        assert!(pii_matches(REDACTION_PLACEHOLDER).is_empty());
    }
}
