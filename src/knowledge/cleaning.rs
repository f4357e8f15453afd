//! Passage text cleanup
//!
//! Stored chunks look like `text:<review body>\nasin:<product id>\n...`; only
//! the review body is kept.

use crate::error::{DeepSearchError, Result};
use regex::Regex;

const TEXT_PREFIX: &str = "text:";

/// Strips the `text:` prefix and the trailing `asin:` metadata block
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    asin_line: Regex,
}

impl ContentCleaner {
    pub fn new() -> Result<Self> {
        let asin_line = Regex::new(r"(?m)^asin:").map_err(|e| {
            DeepSearchError::Config(format!("Failed to compile asin pattern: {}", e))
        })?;
        Ok(Self { asin_line })
    }

    /// Clean one passage
    ///
    /// Everything from the first line that begins with `asin:` to the end of
    /// the string is dropped, together with the newline before it.
    pub fn clean(&self, raw: &str) -> String {
        let body = raw.strip_prefix(TEXT_PREFIX).unwrap_or(raw);

        match self.asin_line.find(body) {
            Some(m) => {
                let head = &body[..m.start()];
                head.strip_suffix('\n').unwrap_or(head).to_string()
            }
            None => body.to_string(),
        }
    }
}
