//! Data models for pagewatch
//!
//! Defines the core data structures: `Item` (one observed piece of content)
//! and `TargetKey` (the storage identity of a monitored page).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, StorageResult};

/// Timestamp sentinel for items whose date could not be extracted
pub const UNKNOWN_TIMESTAMP: &str = "unknown";

/// Maximum number of characters kept in an item title
pub const TITLE_MAX_CHARS: usize = 150;

/// One observed piece of content on a monitored page
///
/// Field order matches the stored JSON documents. Missing fields in stored
/// documents load as empty strings so partially extracted items remain
/// comparable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Visible text of the item, bounded to `TITLE_MAX_CHARS`
    #[serde(default)]
    pub title: String,
    /// Absolute URL the item points to
    #[serde(default)]
    pub link: String,
    /// Extracted date text, or `UNKNOWN_TIMESTAMP`
    #[serde(default)]
    pub timestamp: String,
}

impl Item {
    /// Create a new item, truncating the title to `TITLE_MAX_CHARS`
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        let mut title = title.into();
        if let Some((idx, _)) = title.char_indices().nth(TITLE_MAX_CHARS) {
            title.truncate(idx);
        }
        Self {
            title,
            link: link.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Create an item whose date is unknown
    pub fn undated(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self::new(title, link, UNKNOWN_TIMESTAMP)
    }

    /// Whether the item carries an extracted date
    pub fn has_timestamp(&self) -> bool {
        !self.timestamp.is_empty() && self.timestamp != UNKNOWN_TIMESTAMP
    }
}

/// Storage identity of a monitored target
///
/// Built from `(company, url_type)`: each part is trimmed, whitespace runs
/// and path separators become `_`, and the parts are joined as
/// `{company}_{url_type}`. Case is preserved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetKey(String);

impl TargetKey {
    /// Build the key for a `(company, url_type)` pair
    pub fn new(company: &str, url_type: &str) -> StorageResult<Self> {
        let company = normalize_part(company);
        let url_type = normalize_part(url_type);

        if company.is_empty() && url_type.is_empty() {
            return Err(StorageError::InvalidKey {
                details: "company and url type are both empty".to_string(),
            });
        }

        Ok(Self(format!("{}_{}", company, url_type)))
    }

    /// Rebuild a key from its stored form (file stem or archive entry)
    pub fn from_stored(raw: &str) -> StorageResult<Self> {
        let normalized = normalize_part(raw);
        if normalized.is_empty() || normalized != raw {
            return Err(StorageError::InvalidKey {
                details: format!("'{}' is not a normalized snapshot key", raw),
            });
        }
        Ok(Self(normalized))
    }

    /// The key as used in file names and archive entries
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the per-key snapshot document
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut pending_sep = false;

    for ch in part.trim().chars() {
        if ch.is_whitespace() || ch == '/' || ch == '\\' {
            pending_sep = true;
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.push(ch);
    }

    out
}

/// A monitored page: who it belongs to, what kind of page it is, where it lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub company: String,
    pub url_type: String,
    #[serde(default)]
    pub url: String,
}

impl Target {
    pub fn new(
        company: impl Into<String>,
        url_type: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            company: company.into(),
            url_type: url_type.into(),
            url: url.into(),
        }
    }

    /// Storage key for this target
    pub fn key(&self) -> StorageResult<TargetKey> {
        TargetKey::new(&self.company, &self.url_type)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.company, self.url_type)
    }
}
