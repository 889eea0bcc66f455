//! Field length limits applied before rows leave the tracker.
//!
//! Limits are counted in characters, not bytes, so multi-byte input is never
//! cut in the middle of a code point.

// === Options ===

/// Maximum page title length.
pub const MAX_TITLE_LEN: usize = 512;

/// Maximum page path length.
pub const MAX_PATH_LEN: usize = 2000;

/// Maximum event name length.
pub const MAX_EVENT_NAME_LEN: usize = 200;

// === Session context ===

/// Maximum length for OS/browser names and versions.
pub const MAX_UA_FIELD_LEN: usize = 20;

/// Maximum language code length.
pub const MAX_LANGUAGE_LEN: usize = 10;

/// Maximum referrer URL and referrer name length.
pub const MAX_REFERRER_LEN: usize = 200;

/// Maximum referrer icon URL length.
pub const MAX_REFERRER_ICON_LEN: usize = 2000;

// === Classification ===

/// User-Agents of this length or shorter are ignored.
pub const MIN_USER_AGENT_LEN: usize = 16;

/// User-Agents longer than this are ignored.
pub const MAX_USER_AGENT_LEN: usize = 500;

// === HTTP ===

/// Maximum tracking request body size (64KB).
pub const MAX_BODY_SIZE_BYTES: usize = 64 * 1024;
