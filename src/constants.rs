//! Static tuning constants shared across the classifier, store and engine.

/// Prefix for every persisted storage key.
pub const STORAGE_PREFIX: &str = "@rt:";
/// Reserved broadcast key; writes under this name are doorbells, never records.
pub const SYNC_EVENT_KEY: &str = "@rt:sync";

/// Containers that structure a forum listing (rows, posts, topics).
pub const FORUM_ELEMENTS: &str =
    ".thread, .post, .topic, .discussion, .forum, .message, .entry, .comment";
/// Elements that carry reply/response counters.
pub const REPLY_COUNTS: &str =
    ".reply_count, .replies, .comment-count, .post-count, .response-count";
/// Date, view-count and status regions whose links are rarely thread links.
pub const METADATA_ELEMENTS: &str =
    ".date, .timestamp, .views, .reads, .new-post, .new-reply, .status-icon";
/// Title regions; links inside are always thread links.
pub const TITLE_ELEMENTS: &str = ".thread-title, .topic-title, .post-title, .subject";

/// Forum-ish path segments, or the `thread-*.html` file convention.
pub const FORUM_URL_PATTERN: &str =
    r"(?i)/(?:t|threads|topic|post|p|thread|view|discussion)|thread-.*\.html?$";
/// Href keywords that count only inside a forum container.
pub const FORUM_KEYWORDS: [&str; 5] = ["thread", "topic", "view", "forum", "discussion"];
/// Protocol links that are always tracked, whatever their markup.
pub const EXTERNAL_RESOURCE_SCHEMES: [&str; 3] = ["magnet:", "ed2k:", "thunder:"];
/// Static assets that are never tracked.
pub const EXCLUDED_EXTENSION_PATTERN: &str = r"(?i)\.(jpg|jpeg|png|gif|webp|css|js|json|xml)$";
/// `thread-<fid>-<tid>-<page>.html` as used by Discuz-style boards.
pub const THREAD_FILE_PATTERN: &str = r"thread-\d+-\d+-\d+\.html?$";
/// Bracketed numeric topic ids such as `[12345]` in the link text.
pub const BRACKETED_ID_PATTERN: &str = r"\[\d+\]";

/// Shortest full link text (in characters) accepted as a title.
pub const MIN_TITLE_LENGTH: usize = 5;
/// A record younger than this makes the implicit new-tab visit redundant.
pub const IMPLICIT_VISIT_WINDOW_MS: i64 = 5_000;

/// Attributes inspected for date/time values on an anchor.
pub const TIME_ATTRIBUTES: [&str; 5] = [
    "datetime",
    "title",
    "data-time",
    "data-date-string",
    "data-time-string",
];

/// Marker class applied to read links.
pub const READ_CLASS: &str = "rt-read";
/// Additional marker class for magnet links.
pub const MAGNET_CLASS: &str = "rt-magnet";
/// `id` of the injected stylesheet element.
pub const STYLE_ELEMENT_ID: &str = "rt-read-trail-style";

/// Relative luminance at or below which a background counts as dark.
pub const DARK_LUMINANCE_THRESHOLD: f64 = 0.5;
