//! Recognizer for the textual date/time stamps forum listings put in links.

use once_cell::sync::OnceCell;
use regex::Regex;

const DATE_PATTERNS: [&str; 7] = [
    // 2024-03-05, 2024/3/5, 2024.03.05
    r"^\d{4}[-/.]\d{1,2}[-/.]\d{1,2}$",
    // 05/03/2024, 5-3-24
    r"^\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}$",
    // Mar 5, 2024
    r"^(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2},?\s+\d{4}",
    // 5 Mar 2024
    r"^\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{4}",
    // 2024年3月5日
    r"^\d{4}年\d{1,2}月\d{1,2}日$",
    // 14:05, 2:05 pm
    r"^\d{1,2}:\d{2}(?:\s*[AaPp][Mm])?$",
    r"(?i)^(?:yesterday|today|tomorrow)$",
];

fn patterns() -> Option<&'static [Regex]> {
    static COMPILED: OnceCell<std::result::Result<Vec<Regex>, String>> = OnceCell::new();
    let compiled = COMPILED.get_or_init(|| {
        DATE_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern).map_err(|err| err.to_string()))
            .collect()
    });
    match compiled {
        Ok(regexes) => Some(regexes.as_slice()),
        Err(msg) => {
            tracing::error!(target: "read_trail::classify", error = %msg, "date pattern init failed");
            None
        }
    }
}

/// Whether `text` (trimmed) is nothing but a date or time stamp.
#[must_use]
pub fn is_date_string(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    patterns().is_some_and(|regexes| regexes.iter().any(|regex| regex.is_match(text)))
}
