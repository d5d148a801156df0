//! Storage key derivation: `<prefix><domain>[:<hash>]`.
//!
//! Pure and deterministic so every writer and reader, in every tab and every process,
//! agrees on the key for a URL. Hash collisions between URLs of one domain are accepted:
//! two colliding URLs would share a per-URL bucket.

use url::Url;

use crate::constants::STORAGE_PREFIX;
use crate::types::KeyScheme;

/// Java-style 31-multiplier rolling hash over UTF-16 code units, as an unsigned 32-bit value.
#[must_use]
pub fn hash_code(text: &str) -> u32 {
    text.encode_utf16().fold(0u32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(u32::from(unit))
    })
}

/// Hostname of `url`; empty when nothing resembling an authority can be found.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) => parsed.host_str().unwrap_or_default().to_string(),
        Err(err) => {
            tracing::debug!(keys.url = url, error = %err, "url parse failed; using fallback");
            fallback_domain(url)
        }
    }
}

/// Lenient authority scan for strings the URL parser rejects.
fn fallback_domain(url: &str) -> String {
    let trimmed = url.trim();
    let Some((_, rest)) = trimmed.split_once("//") else {
        return String::new();
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    let host = if host_port.starts_with('[') {
        host_port
            .split_once(']')
            .map_or(host_port, |(inner, _)| inner.trim_start_matches('['))
    } else {
        host_port.split(':').next().unwrap_or_default()
    };
    host.to_ascii_lowercase()
}

/// Storage key for `url` under `scheme`.
#[must_use]
pub fn derive_key(url: &str, scheme: KeyScheme) -> String {
    let domain = extract_domain(url);
    match scheme {
        KeyScheme::PerUrl => format!("{STORAGE_PREFIX}{domain}:{}", hash_code(url)),
        KeyScheme::DomainSharded => format!("{STORAGE_PREFIX}{domain}"),
    }
}
