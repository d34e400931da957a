use std::time::Duration;

use reqwest::header::{HeaderMap, SET_COOKIE};

/// Captured HTTP response that a test's checks run against. The body is
/// read fully before any check executes, so every check in the declared
/// order sees the same bytes.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Round-trip time including reading the body.
    pub duration: Duration,
    /// Final URL after any redirects.
    pub url: String,
}

impl Response {
    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First value of `name`, if present and readable as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Name/value pairs of every Set-Cookie header, attributes stripped.
    #[must_use]
    pub fn set_cookies(&self) -> Vec<(String, String)> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| {
                let pair = raw.split(';').next()?;
                let (name, value) = pair.split_once('=')?;
                Some((name.trim().to_owned(), value.trim().to_owned()))
            })
            .collect()
    }
}
