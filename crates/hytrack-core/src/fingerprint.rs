//! Status fingerprints
//!
//! A fingerprint is the SHA-256 of a canonical rendering of the semantically
//! meaningful fields of a [`StatusPayload`]. Two payloads that differ only in
//! whitespace, letter case, tracking URL or observation time fingerprint the
//! same; any change in courier, status, location, event date or event time
//! produces a different digest.
//!
//! Canonical form: each field has whitespace runs collapsed to one space, is
//! trimmed and lowercased; missing fields are empty; fields are joined with
//! the ASCII unit separator so content cannot shift across field boundaries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::traits::StatusPayload;

/// Separates fields in the canonical form
const FIELD_SEPARATOR: char = '\u{1f}';

/// Lowercase hex SHA-256 digest of a normalized status
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a status payload
    pub fn of(payload: &StatusPayload) -> Self {
        Self::of_text(&canonical_form(payload))
    }

    pub(crate) fn of_text(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse a stored hex digest
    pub fn from_hex(hex_digest: &str) -> Result<Self, crate::Error> {
        let valid = hex_digest.len() == 64
            && hex_digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(crate::Error::invalid_input(format!(
                "Not a SHA-256 hex digest: '{}'",
                hex_digest
            )));
        }
        Ok(Self(hex_digest.to_string()))
    }

    /// Hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical text of the fields that define a status
pub fn canonical_form(payload: &StatusPayload) -> String {
    let fields = [
        payload.courier.code(),
        payload.status.as_str(),
        payload.location.as_deref().unwrap_or(""),
        payload.event_date.as_deref().unwrap_or(""),
        payload.event_time.as_deref().unwrap_or(""),
    ];

    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        out.push_str(&normalize_field(field));
    }
    out
}

fn normalize_field(field: &str) -> String {
    field
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
