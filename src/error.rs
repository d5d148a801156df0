use thiserror::Error;

/// Errors surfaced by `read-trail`.
///
/// Only persistence writes and backend I/O propagate these to callers. Classification,
/// key derivation and store reads degrade to safe defaults instead.
#[derive(Debug, Error)]
pub enum TrailError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Persistence backend failure for `{key}`: {reason}")]
    Backend { key: String, reason: String },

    #[error("Background task failed: {reason}")]
    TaskJoin { reason: String },
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, TrailError>;
