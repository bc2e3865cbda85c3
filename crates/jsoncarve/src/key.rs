//! Key-anchored extraction: pull a named field's value out of a partially
//! received object.

use regex::Regex;
use serde_json::Value;

use crate::scan::{Scan, scan_value};

/// Outcome of looking for a named field's composite value in partial text.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyExtract {
    /// The field's value has fully arrived.
    Complete {
        /// The decoded value.
        value: Value,
        /// Byte offset of the first character after the value.
        end: usize,
    },
    /// The field has started streaming but its value has not closed yet.
    Incomplete,
    /// The field has not appeared in the text at all yet.
    NotFound,
}

/// A compiled anchor for one expected key.
///
/// The anchor matches `"key"` followed by a colon and an opening `{` or `[`,
/// quote-delimited on both sides so a key that is a substring of a longer key
/// (e.g. `meta` inside `metadata`) never matches. Matching is case-sensitive
/// and exact.
#[derive(Debug, Clone)]
pub struct KeyAnchor {
    key: String,
    pattern: Regex,
}

impl KeyAnchor {
    /// Compiles an anchor for `key`.
    #[must_use]
    pub fn new(key: &str) -> Self {
        let pattern = Regex::new(&format!(r#""{}"\s*:\s*[\{{\[]"#, regex::escape(key)))
            .expect("escaped key forms a valid pattern");
        Self {
            key: key.to_owned(),
            pattern,
        }
    }

    /// The key this anchor was compiled for.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Locates the first occurrence of the anchored key in `text` and
    /// attempts to decode its value.
    ///
    /// Purely a read: `text` is never consumed or mutated.
    #[must_use]
    pub fn extract(&self, text: &str) -> KeyExtract {
        let Some(m) = self.pattern.find(text) else {
            return KeyExtract::NotFound;
        };
        // The match ends on the value's opening `{` or `[`.
        match scan_value(text, m.end() - 1) {
            Scan::Complete { value, end } => KeyExtract::Complete { value, end },
            Scan::Incomplete => KeyExtract::Incomplete,
        }
    }
}

/// One-shot convenience for [`KeyAnchor::extract`].
///
/// Callers that re-scan the same key on every chunk should hold a
/// [`KeyAnchor`] (or use [`crate::KeySequence`]) to compile the pattern once.
#[must_use]
pub fn extract_by_key(text: &str, key: &str) -> KeyExtract {
    KeyAnchor::new(key).extract(text)
}
