//! Persisted visit records and the cross-tab doorbell envelope.

use serde::{Deserialize, Serialize};

/// One visit record per distinct tracked URL.
///
/// `visited_at` is always stamped by the store at write time; whatever a caller puts there
/// is overwritten by [`ReadStore::set`](crate::store::ReadStore::set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRecord {
    pub url: String,
    /// Epoch milliseconds. Older buckets wrote this field as `timestamp`.
    #[serde(alias = "timestamp")]
    pub visited_at: i64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ReadRecord {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            visited_at: 0,
            reply_count: 0,
            note: None,
        }
    }

    #[must_use]
    pub fn with_reply_count(mut self, reply_count: u64) -> Self {
        self.reply_count = reply_count;
        self
    }

    /// Attach a free-text note; blank notes are stored as absent.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        self.note = if note.trim().is_empty() {
            None
        } else {
            Some(note)
        };
        self
    }

    /// Tooltip text shown on a marked link.
    #[must_use]
    pub fn tooltip(&self) -> String {
        let when = chrono::DateTime::from_timestamp_millis(self.visited_at)
            .map(|utc| {
                utc.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "unknown time".to_string());
        let mut text = format!("Read on {when} - Replies: {}", self.reply_count);
        if let Some(note) = self.note.as_deref() {
            text.push_str(" - Note: ");
            text.push_str(note);
        }
        text
    }
}

/// Doorbell written to the broadcast channel after every successful persist.
///
/// Receivers use it only as an invalidation hint; `key` names the bucket to drop from cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSignal {
    pub timestamp: i64,
    pub key: String,
}

impl SyncSignal {
    #[must_use]
    pub fn new(key: impl Into<String>, timestamp: i64) -> Self {
        Self {
            timestamp,
            key: key.into(),
        }
    }

    /// Parse a raw broadcast value; `None` when it is not a well-formed envelope.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}
