//! Small string helpers shared by the tracker and the storage layer.

/// Shortens a string to at most `max` characters.
pub fn shorten(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// Returns true if the string contains any non-ASCII character.
pub fn contains_non_ascii(value: &str) -> bool {
    !value.is_ascii()
}

/// Strips a leading `www.` from a hostname.
pub fn strip_www(hostname: &str) -> &str {
    hostname.strip_prefix("www.").unwrap_or(hostname)
}
