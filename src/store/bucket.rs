//! The value persisted under one storage key.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{KeyScheme, ReadRecord};

/// Decoded contents of one storage key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Bucket {
    /// Nothing stored, or something stored that did not validate.
    #[default]
    Empty,
    /// Per-URL layout.
    Single(ReadRecord),
    /// Domain-sharded layout: full URL to record.
    Domain(BTreeMap<String, ReadRecord>),
}

impl Bucket {
    /// Decode a raw persisted value. Anything that does not validate is `Empty`.
    #[must_use]
    pub fn decode(scheme: KeyScheme, key: &str, raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Empty;
        };
        let decoded = match scheme {
            KeyScheme::PerUrl => serde_json::from_str::<ReadRecord>(raw).map(Self::Single),
            KeyScheme::DomainSharded => {
                serde_json::from_str::<BTreeMap<String, ReadRecord>>(raw).map(Self::Domain)
            }
        };
        match decoded {
            Ok(bucket) => bucket,
            Err(err) => {
                tracing::warn!(store.key = key, error = %err, "discarding invalid bucket");
                Self::Empty
            }
        }
    }

    /// Record for exactly `url`; a per-URL bucket holding a colliding URL yields `None`.
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<&ReadRecord> {
        match self {
            Self::Empty => None,
            Self::Single(record) => (record.url == url).then_some(record),
            Self::Domain(records) => records.get(url),
        }
    }

    /// This bucket with `record` written in, keeping sibling URLs of a domain bucket.
    #[must_use]
    pub fn merged(&self, record: ReadRecord, scheme: KeyScheme) -> Self {
        match scheme {
            KeyScheme::PerUrl => Self::Single(record),
            KeyScheme::DomainSharded => {
                let mut records = match self {
                    Self::Domain(records) => records.clone(),
                    _ => BTreeMap::new(),
                };
                records.insert(record.url.clone(), record);
                Self::Domain(records)
            }
        }
    }

    pub fn encode(&self) -> Result<String> {
        let encoded = match self {
            Self::Empty => "{}".to_string(),
            Self::Single(record) => serde_json::to_string(record)?,
            Self::Domain(records) => serde_json::to_string(records)?,
        };
        Ok(encoded)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single(_) => 1,
            Self::Domain(records) => records.len(),
        }
    }
}
