//! Deterministic spot fingerprints.
//!
//! The listing page carries no identifier for a listing, so a spot is
//! identified by what it says: kindergarten name, age group and date. Two
//! listings that agree on all three collapse to the same identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::AgeGroup;

/// Number of digest bytes kept in a fingerprint (128 bits).
const FINGERPRINT_BYTES: usize = 16;

/// Hex-encoded 128-bit fingerprint of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotId(String);

impl SpotId {
    /// Fingerprint `"{name}-{age_group}-{date}"` with SHA-256, truncated to
    /// 128 bits.
    pub fn derive(name: &str, age_group: AgeGroup, availability_date: &str) -> Self {
        let key = format!("{name}-{age_group}-{availability_date}");
        let digest = Sha256::digest(key.as_bytes());
        Self(hex::encode(&digest[..FINGERPRINT_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stored ids are taken as-is; older rows may carry ids from another digest.
impl From<String> for SpotId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_triple_same_id() {
        let a = SpotId::derive("Eksempel Barnehage", AgeGroup::Under3, "now");
        let b = SpotId::derive("Eksempel Barnehage", AgeGroup::Under3, "now");
        assert_eq!(a, b);
    }

    #[test]
    fn any_component_changes_the_id() {
        let base = SpotId::derive("Eksempel Barnehage", AgeGroup::Under3, "now");
        assert_ne!(base, SpotId::derive("Eksempel barnehage", AgeGroup::Under3, "now"));
        assert_ne!(base, SpotId::derive("Eksempel Barnehage", AgeGroup::Over3, "now"));
        assert_ne!(
            base,
            SpotId::derive("Eksempel Barnehage", AgeGroup::Under3, "August 2025")
        );
    }

    #[test]
    fn id_is_32_lowercase_hex_chars() {
        let id = SpotId::derive("Eksempel Barnehage", AgeGroup::TwoToSix, "01.08.2025");
        assert_eq!(id.as_str().len(), 32);
        assert!(
            id.as_str()
                .bytes()
                .all(|b| b.is_ascii_digit() || matches!(b, b'a'..=b'f'))
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = SpotId::from("abc123".to_string());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }
}
