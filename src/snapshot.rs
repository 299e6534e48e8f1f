//! The last accepted buffer value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The last value+timestamp the detector accepted as current.
///
/// `content == None` means the buffer was never read (or never held text).
/// Only the change detector's accept step produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    /// Last accepted buffer value.
    pub content: Option<String>,
    /// Wall-clock time of acceptance.
    pub observed_at: DateTime<Utc>,
}

impl BufferSnapshot {
    /// A snapshot that has never accepted anything.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            content: None,
            observed_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// A snapshot holding `content` accepted at `observed_at`.
    #[must_use]
    pub fn accepted(content: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            content: Some(content.into()),
            observed_at,
        }
    }

    /// Returns true if no content has ever been accepted.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.content.is_none()
    }

    /// Exact comparison against a fresh read.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        self.content.as_deref() == Some(raw)
    }

    /// Short digest of the content, safe to put in logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.content
            .as_deref()
            .map_or_else(|| "none".to_string(), fingerprint)
    }
}

impl Default for BufferSnapshot {
    fn default() -> Self {
        Self::unknown()
    }
}

/// First 12 hex digits of the blake3 digest of `text`.
#[must_use]
pub fn fingerprint(text: &str) -> String {
    let hex = blake3::hash(text.as_bytes()).to_hex();
    hex.as_str()[..12].to_string()
}
