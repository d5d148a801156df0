//! Heuristic link classifier: which anchors are thread-like and worth read-tracking.
//!
//! Every predicate is total. A selector or pattern that fails to compile is logged once
//! at construction and the predicate built from it answers `false` from then on.

mod dates;

use regex::Regex;

pub use dates::is_date_string;

use crate::constants::{EXTERNAL_RESOURCE_SCHEMES, TIME_ATTRIBUTES};
use crate::dom::{ElementRef, SelectorList};
use crate::error::TrailError;
use crate::types::TrailConfig;

fn compile_selector(group: &str, source: &str) -> Option<SelectorList> {
    match SelectorList::parse(source) {
        Ok(list) => Some(list),
        Err(err) => {
            tracing::warn!(classify.group = group, error = %err, "selector disabled");
            None
        }
    }
}

fn compile_pattern(name: &str, source: &str) -> Option<Regex> {
    let compiled = Regex::new(source).map_err(|err| TrailError::InvalidPattern {
        pattern: source.to_string(),
        reason: err.to_string(),
    });
    match compiled {
        Ok(regex) => Some(regex),
        Err(err) => {
            tracing::warn!(classify.pattern = name, error = %err, "pattern disabled");
            None
        }
    }
}

/// Compiled classifier for one configuration.
#[derive(Debug, Clone)]
pub struct Classifier {
    forum_elements: Option<SelectorList>,
    reply_counts: Option<SelectorList>,
    metadata_elements: Option<SelectorList>,
    title_elements: Option<SelectorList>,
    time_element: Option<SelectorList>,
    forum_url: Option<Regex>,
    exclude: Option<Regex>,
    thread_file: Option<Regex>,
    bracketed_id: Option<Regex>,
    keywords: Vec<String>,
    min_title_length: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&TrailConfig::default())
    }
}

impl Classifier {
    #[must_use]
    pub fn new(config: &TrailConfig) -> Self {
        let selectors = &config.selectors;
        let patterns = &config.patterns;
        Self {
            forum_elements: compile_selector("forum_elements", &selectors.forum_elements),
            reply_counts: compile_selector("reply_counts", &selectors.reply_counts),
            metadata_elements: compile_selector("metadata_elements", &selectors.metadata_elements),
            title_elements: compile_selector("title_elements", &selectors.title_elements),
            time_element: compile_selector("time", "time"),
            forum_url: compile_pattern("forum", &patterns.forum),
            exclude: compile_pattern("exclude", &patterns.exclude),
            thread_file: compile_pattern("thread_file", &patterns.thread_file),
            bracketed_id: compile_pattern("bracketed_id", &patterns.bracketed_id),
            keywords: patterns
                .keywords
                .iter()
                .map(|keyword| keyword.to_lowercase())
                .collect(),
            min_title_length: config.min_title_length,
        }
    }

    /// Whether `anchor` should be read-tracked.
    #[must_use]
    pub fn is_trackable(&self, anchor: ElementRef<'_>) -> bool {
        Self::is_external_resource_link(anchor) || self.is_content_thread_link(anchor)
    }

    /// Magnet and similar protocol links; always trackable.
    #[must_use]
    pub fn is_external_resource_link(anchor: ElementRef<'_>) -> bool {
        anchor.href().is_some_and(|href| is_external_resource_url(&href))
    }

    /// The ordered heuristic for ordinary links. Steps short-circuit in order.
    #[must_use]
    pub fn is_content_thread_link(&self, anchor: ElementRef<'_>) -> bool {
        let Some(href) = anchor.href() else {
            return false;
        };
        let href = href.to_lowercase();
        if matches_opt(self.exclude.as_ref(), &href) {
            return false;
        }

        if self.is_time_element(anchor) {
            return false;
        }

        let direct_text = anchor.direct_text();
        let direct_text = direct_text.trim();
        let full_text = anchor.text_content();
        let full_text = full_text.trim();
        let rich_child_content = direct_text != full_text;

        if !rich_child_content
            && (is_numeric(direct_text)
                || full_text.chars().count() < self.min_title_length
                || is_date_string(direct_text))
        {
            return false;
        }

        if !rich_child_content && within(anchor, self.metadata_elements.as_ref()) {
            return false;
        }

        if within(anchor, self.title_elements.as_ref()) {
            return true;
        }

        matches_opt(self.forum_url.as_ref(), &href)
            || href.contains("thread")
            || (self.keywords.iter().any(|keyword| href.contains(keyword.as_str()))
                && within(anchor, self.forum_elements.as_ref()))
            || matches_opt(self.bracketed_id.as_ref(), full_text)
            || matches_opt(self.thread_file.as_ref(), &href)
    }

    fn is_time_element(&self, anchor: ElementRef<'_>) -> bool {
        if let Some(time) = self.time_element.as_ref() {
            if anchor.closest(time).is_some() || anchor.query_selector(time).is_some() {
                return true;
            }
        }
        TIME_ATTRIBUTES
            .iter()
            .filter_map(|name| anchor.attr(name))
            .any(is_date_string)
    }

    /// Whether a page URL looks like a thread or magnet target (used for implicit visits).
    #[must_use]
    pub fn is_forum_like_url(&self, url: &str) -> bool {
        let lowered = url.to_lowercase();
        is_external_resource_url(&lowered)
            || matches_opt(self.forum_url.as_ref(), &lowered)
            || self
                .keywords
                .iter()
                .any(|keyword| lowered.contains(keyword.as_str()))
    }

    /// Reply count from the first reply-counter element inside `scope`; 0 when none parses.
    #[must_use]
    pub fn find_reply_count(&self, scope: ElementRef<'_>) -> u64 {
        let Some(selector) = self.reply_counts.as_ref() else {
            return 0;
        };
        scope
            .query_selector(selector)
            .and_then(|counter| parse_count(&counter.text_content()))
            .unwrap_or(0)
    }

    /// Reply count for a clicked anchor, read from its nearest forum container.
    #[must_use]
    pub fn reply_count_near(&self, anchor: ElementRef<'_>) -> u64 {
        self.forum_elements
            .as_ref()
            .and_then(|selector| anchor.closest(selector))
            .map_or(0, |container| self.find_reply_count(container))
    }
}

fn is_external_resource_url(href: &str) -> bool {
    let lowered = href.trim_start().to_ascii_lowercase();
    EXTERNAL_RESOURCE_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
}

fn matches_opt(regex: Option<&Regex>, text: &str) -> bool {
    regex.is_some_and(|regex| regex.is_match(text))
}

fn within(anchor: ElementRef<'_>, selector: Option<&SelectorList>) -> bool {
    selector.is_some_and(|selector| anchor.closest(selector).is_some())
}

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|ch| ch.is_ascii_digit())
}

/// First integer in `text`, ignoring `,`/`.` thousands separators between digits.
fn parse_count(text: &str) -> Option<u64> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(char::is_ascii_digit)?;
    let mut digits = String::new();
    let mut cursor = start;
    while cursor < chars.len() {
        let ch = chars[cursor];
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            let separator = matches!(ch, ',' | '.')
                && chars.get(cursor + 1).is_some_and(char::is_ascii_digit);
            if !separator {
                break;
            }
        }
        cursor += 1;
    }
    digits.parse().ok()
}
