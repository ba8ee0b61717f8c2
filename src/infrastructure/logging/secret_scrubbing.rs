use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Redacts access tokens from text before it reaches a log line.
#[derive(Clone)]
pub struct SecretScrubber {
    query_pattern: Regex,
    json_field_pattern: Regex,
    bearer_pattern: Regex,
    password_pattern: Regex,
}

impl SecretScrubber {
    /// Create a new scrubber
    pub fn new() -> Self {
        Self {
            // accessToken=... / refreshToken=... in URLs and form bodies
            query_pattern: Regex::new(r"(?i)((?:access|refresh)_?token)=[^&\s]+")
                .expect("static regex"),
            // "accessToken": "..." in JSON bodies
            json_field_pattern: Regex::new(r#"(?i)"((?:access|refresh)_?token)"\s*:\s*"[^"]*""#)
                .expect("static regex"),
            // Bearer tokens in Authorization headers
            bearer_pattern: Regex::new(r"Bearer\s+[a-zA-Z0-9\-_\.]+").expect("static regex"),
            password_pattern: Regex::new(r#""?password"?\s*[:=]\s*"?[^"\s,}]+"?"#)
                .expect("static regex"),
        }
    }

    /// Process-wide instance
    pub fn global() -> &'static Self {
        static SCRUBBER: OnceLock<SecretScrubber> = OnceLock::new();
        SCRUBBER.get_or_init(Self::new)
    }

    /// Scrub a message of sensitive data
    pub fn scrub(&self, message: &str) -> String {
        let scrubbed = self.query_pattern.replace_all(message, "$1=[REDACTED]");
        let scrubbed = self
            .json_field_pattern
            .replace_all(&scrubbed, "\"$1\":\"[REDACTED]\"");
        let scrubbed = self
            .bearer_pattern
            .replace_all(&scrubbed, "Bearer [TOKEN_REDACTED]");
        self.password_pattern
            .replace_all(&scrubbed, "password=[REDACTED]")
            .into_owned()
    }
}

impl Default for SecretScrubber {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SecretScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretScrubber").finish()
    }
}
