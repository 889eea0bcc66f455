//! User-Agent parsing.

use woothee::parser::Parser;

/// Parsed User-Agent fields. Unknown values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgent {
    pub os: String,
    pub os_version: String,
    pub browser: String,
    pub browser_version: String,
    pub desktop: bool,
    pub mobile: bool,
    /// Known crawler
    pub crawler: bool,
}

/// Turns a raw `User-Agent` header into [`UserAgent`] fields.
///
/// Must not fail: malformed input yields empty fields.
pub trait UserAgentParser: Send + Sync {
    fn parse(&self, raw: &str) -> UserAgent;
}

/// [`UserAgentParser`] backed by woothee.
pub struct WootheeParser {
    parser: Parser,
}

impl WootheeParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }
}

impl Default for WootheeParser {
    fn default() -> Self {
        Self::new()
    }
}

fn known(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        String::new()
    } else {
        value.to_string()
    }
}

impl UserAgentParser for WootheeParser {
    fn parse(&self, raw: &str) -> UserAgent {
        let Some(result) = self.parser.parse(raw) else {
            return UserAgent::default();
        };

        // woothee categories: pc, smartphone, mobilephone, crawler, appliance, misc
        UserAgent {
            os: known(result.os),
            os_version: known(&result.os_version),
            browser: known(result.name),
            browser_version: known(result.version),
            desktop: result.category == "pc",
            mobile: matches!(result.category, "smartphone" | "mobilephone"),
            crawler: result.category == "crawler",
        }
    }
}
