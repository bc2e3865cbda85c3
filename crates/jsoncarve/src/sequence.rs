//! Ordered key-sequence driver: emit each expected top-level key's value
//! exactly once, in declared order, from a chunked transcript.

use serde_json::Value;

use crate::key::{KeyAnchor, KeyExtract};

/// One emitted `(key, value)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionValue {
    /// Position of the key in the declared sequence.
    pub index: usize,
    /// The key name.
    pub key: String,
    /// The key's fully decoded value.
    pub value: Value,
}

/// Stateful driver over a fixed, ordered list of expected top-level keys.
///
/// The driver scans a bounded window (the unconsumed tail of the transcript,
/// not the whole growing text) for the *current* key only, advancing to the
/// next key once the current one's value has closed. This bounds re-scan cost
/// and fixes the emission order.
///
/// Precondition: the generator emits the expected keys in declared order,
/// non-interleaved and unrepeated. This is a contract of the upstream
/// output, not something the driver verifies; a transcript that presents a
/// later key first stalls the cursor on the missing earlier key.
#[derive(Debug, Clone)]
pub struct KeySequence {
    anchors: Vec<KeyAnchor>,
    cursor: usize,
    tail: String,
}

impl KeySequence {
    /// Builds a driver for `keys`, expected in iteration order.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            anchors: keys
                .into_iter()
                .map(|k| KeyAnchor::new(k.as_ref()))
                .collect(),
            cursor: 0,
            tail: String::new(),
        }
    }

    /// Index of the key currently being waited on.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether every expected key has been emitted. Once done, the driver
    /// ignores further input; callers keep accumulating the raw transcript
    /// for the final whole-document parse.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.cursor >= self.anchors.len()
    }

    /// Feeds one newly arrived chunk, returning every key value that
    /// completed within the current window.
    ///
    /// The window is the carried tail plus `chunk`. After a key completes,
    /// everything scanned before the current chunk is dropped: later keys
    /// start no earlier than the current chunk boundary because the source
    /// emits keys one after another in declared order. A single call can
    /// emit several keys when one chunk closes more than one value.
    pub fn feed(&mut self, chunk: &str) -> Vec<SectionValue> {
        let mut out = Vec::new();
        if self.is_done() {
            return out;
        }
        let mut window = std::mem::take(&mut self.tail);
        window.push_str(chunk);
        while let Some(anchor) = self.anchors.get(self.cursor) {
            match anchor.extract(&window) {
                KeyExtract::Complete { value, .. } => {
                    out.push(SectionValue {
                        index: self.cursor,
                        key: anchor.key().to_owned(),
                        value,
                    });
                    self.cursor += 1;
                    window.clear();
                    window.push_str(chunk);
                }
                KeyExtract::Incomplete | KeyExtract::NotFound => break,
            }
        }
        if !self.is_done() {
            self.tail = window;
        }
        out
    }
}
