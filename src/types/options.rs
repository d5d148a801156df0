//! Configuration for the classifier, store layout and engine thresholds.
//!
//! Defaults mirror [`crate::constants`]; hosts normally use `TrailConfig::default()`.

use serde::{Deserialize, Serialize};

use crate::constants::{
    BRACKETED_ID_PATTERN, EXCLUDED_EXTENSION_PATTERN, FORUM_ELEMENTS, FORUM_KEYWORDS,
    FORUM_URL_PATTERN, IMPLICIT_VISIT_WINDOW_MS, METADATA_ELEMENTS, MIN_TITLE_LENGTH,
    REPLY_COUNTS, THREAD_FILE_PATTERN, TITLE_ELEMENTS,
};

/// How storage keys are derived from URLs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    /// `@rt:<domain>:<hash>`, one record per key.
    #[default]
    PerUrl,
    /// `@rt:<domain>`, one URL-to-record map per domain.
    DomainSharded,
}

/// CSS selector groups recognized by the classifier and the reply-count lookup.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SelectorGroups {
    pub forum_elements: String,
    pub reply_counts: String,
    pub metadata_elements: String,
    pub title_elements: String,
}

impl Default for SelectorGroups {
    fn default() -> Self {
        Self {
            forum_elements: FORUM_ELEMENTS.to_string(),
            reply_counts: REPLY_COUNTS.to_string(),
            metadata_elements: METADATA_ELEMENTS.to_string(),
            title_elements: TITLE_ELEMENTS.to_string(),
        }
    }
}

/// Regular expressions and keywords applied to hrefs and link text.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct UrlPatterns {
    pub forum: String,
    pub keywords: Vec<String>,
    pub exclude: String,
    pub thread_file: String,
    pub bracketed_id: String,
}

impl Default for UrlPatterns {
    fn default() -> Self {
        Self {
            forum: FORUM_URL_PATTERN.to_string(),
            keywords: FORUM_KEYWORDS.iter().map(ToString::to_string).collect(),
            exclude: EXCLUDED_EXTENSION_PATTERN.to_string(),
            thread_file: THREAD_FILE_PATTERN.to_string(),
            bracketed_id: BRACKETED_ID_PATTERN.to_string(),
        }
    }
}

/// Complete tuning surface for one page's engine.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TrailConfig {
    #[serde(default)]
    pub selectors: SelectorGroups,
    #[serde(default)]
    pub patterns: UrlPatterns,
    #[serde(default = "default_min_title_length")]
    pub min_title_length: usize,
    /// Milliseconds within which an existing record makes the implicit new-tab visit redundant.
    #[serde(default = "default_implicit_visit_window_ms")]
    pub implicit_visit_window_ms: i64,
    #[serde(default)]
    pub key_scheme: KeyScheme,
}

fn default_min_title_length() -> usize {
    MIN_TITLE_LENGTH
}

fn default_implicit_visit_window_ms() -> i64 {
    IMPLICIT_VISIT_WINDOW_MS
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            selectors: SelectorGroups::default(),
            patterns: UrlPatterns::default(),
            min_title_length: default_min_title_length(),
            implicit_visit_window_ms: default_implicit_visit_window_ms(),
            key_scheme: KeyScheme::default(),
        }
    }
}

impl TrailConfig {
    #[must_use]
    pub fn with_key_scheme(mut self, key_scheme: KeyScheme) -> Self {
        self.key_scheme = key_scheme;
        self
    }
}
