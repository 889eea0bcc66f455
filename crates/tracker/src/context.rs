//! Request context stored on new sessions: language, screen class and
//! campaign parameters.

use crate::request::TrackingRequest;

/// Screen classes by minimum width, widest first.
const SCREEN_CLASSES: [(u16, &str); 9] = [
    (5120, "UHD 5K"),
    (3840, "UHD 4K"),
    (2560, "WQHD"),
    (1920, "Full HD"),
    (1280, "HD"),
    (1024, "XL"),
    (800, "L"),
    (600, "M"),
    (415, "S"),
];

/// Language code of the first `Accept-Language` entry, e.g. `de` for
/// `de-DE,de;q=0.9`. Empty unless it is a two or three letter code.
pub fn language(req: &TrackingRequest) -> String {
    let header = req.header("accept-language");
    let first = header.split([';', ',']).next().unwrap_or_default();
    let code = first
        .split('-')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_lowercase()) {
        code
    } else {
        String::new()
    }
}

/// Screen class for the given width, falling back to client hint headers.
/// Empty if no width is known.
pub fn screen_class(req: &TrackingRequest, width: u16) -> String {
    let width = if width > 0 {
        width
    } else {
        width_from_header(req, "sec-ch-width")
            .or_else(|| width_from_header(req, "sec-ch-viewport-width"))
            .unwrap_or(0)
    };

    if width == 0 {
        return String::new();
    }

    SCREEN_CLASSES
        .iter()
        .find(|(min, _)| width >= *min)
        .map(|(_, class)| class.to_string())
        .unwrap_or_else(|| "XS".to_string())
}

fn width_from_header(req: &TrackingRequest, name: &str) -> Option<u16> {
    req.header(name)
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|w| *w > 0)
}

/// Campaign parameters from the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utm {
    pub source: String,
    pub medium: String,
    pub campaign: String,
    pub content: String,
    pub term: String,
}

impl Utm {
    pub fn from_request(req: &TrackingRequest) -> Self {
        Self {
            source: req.query_trimmed("utm_source"),
            medium: req.query_trimmed("utm_medium"),
            campaign: req.query_trimmed("utm_campaign"),
            content: req.query_trimmed("utm_content"),
            term: req.query_trimmed("utm_term"),
        }
    }
}
