//! Item fingerprints
//!
//! A fingerprint is the SHA-256 digest of `title|timestamp|link`. Two items
//! are the same item iff their fingerprints are equal.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::models::Item;

/// Separator between fields in the canonical string
const FIELD_SEPARATOR: char = '|';

/// Fixed-size content digest of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the fingerprint of an item
pub fn fingerprint(item: &Item) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(item).as_bytes());
    Fingerprint(hasher.finalize().into())
}

fn canonical_string(item: &Item) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        item.title,
        item.timestamp,
        item.link,
        sep = FIELD_SEPARATOR
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item::new("Q1 results", "https://acme.com/q1", "2024-01-10")
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(fingerprint(&item()), fingerprint(&item()));
    }

    #[test]
    fn test_fingerprint_is_stable_across_processes() {
        // sha256("Q1 results|2024-01-10|https://acme.com/q1")
        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"Q1 results|2024-01-10|https://acme.com/q1");
            format!("{:x}", hasher.finalize())
        };
        assert_eq!(fingerprint(&item()).to_hex(), expected);
        assert_eq!(fingerprint(&item()).to_string().len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_each_field() {
        let base = fingerprint(&item());

        let mut changed = item();
        changed.title = "Q2 results".to_string();
        assert_ne!(fingerprint(&changed), base);

        let mut changed = item();
        changed.link = "https://acme.com/q2".to_string();
        assert_ne!(fingerprint(&changed), base);

        let mut changed = item();
        changed.timestamp = "2024-04-10".to_string();
        assert_ne!(fingerprint(&changed), base);
    }

    #[test]
    fn test_fingerprint_of_empty_item() {
        let empty = Item::default();
        assert_eq!(fingerprint(&empty), fingerprint(&Item::default()));
        assert_ne!(fingerprint(&empty), fingerprint(&item()));
    }

    #[test]
    fn test_canonical_string_order() {
        assert_eq!(
            canonical_string(&item()),
            "Q1 results|2024-01-10|https://acme.com/q1"
        );
    }
}
