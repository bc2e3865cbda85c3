//! Repeated-object extraction: carve every complete instance of a recurring
//! record shape out of an accumulating buffer.

use std::collections::HashSet;

use regex::Regex;
use serde_json::Value;

use crate::scan::{Scan, scan_value};

/// Recognizes the start of a repeated record by its discriminator field.
///
/// A marker compiled for `"id"` matches `{ "id":` with optional interior
/// whitespace, the textual signature of a new record in the stream.
#[derive(Debug, Clone)]
pub struct Marker {
    key: String,
    pattern: Regex,
}

impl Marker {
    /// Compiles a marker for records discriminated by `key`.
    #[must_use]
    pub fn new(key: &str) -> Self {
        let pattern = Regex::new(&format!(r#"\{{\s*"{}"\s*:"#, regex::escape(key)))
            .expect("escaped key forms a valid pattern");
        Self {
            key: key.to_owned(),
            pattern,
        }
    }

    /// The discriminator key this marker was compiled for.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The discriminator field of an extracted record, used for caller-side
    /// dedup. `None` if the record is not an object carrying the field.
    #[must_use]
    pub fn identity<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        value.get(&self.key)
    }
}

/// One record carved out of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// The decoded record.
    pub value: Value,
    /// Byte offset just past the record, in the coordinates of the buffer
    /// passed to [`extract_records`].
    pub end: usize,
}

/// Result of one extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Every complete record found, in left-to-right arrival order.
    pub records: Vec<Extracted>,
    /// The buffer with all consumed text removed from its front. Pass this
    /// (plus newly arrived text) as the next call's buffer; re-feeding text
    /// that was already consumed is what produces duplicate records.
    pub rest: String,
}

/// Scans `buffer` for every complete record recognized by `marker`.
///
/// Records are consumed in arrival order: when the record at the next marker
/// has not finished arriving the pass stops there, even if a later marker's
/// record happens to look complete, so emission order always matches stream
/// order. After each consumed record the scan restarts from the front of the
/// shortened buffer.
#[must_use]
pub fn extract_records(buffer: &str, marker: &Marker) -> Extraction {
    let mut records = Vec::new();
    let mut rest = buffer;
    let mut consumed = 0usize;
    loop {
        let Some(m) = marker.pattern.find(rest) else {
            break;
        };
        match scan_value(rest, m.start()) {
            Scan::Complete { value, end } => {
                records.push(Extracted {
                    value,
                    end: consumed + end,
                });
                consumed += end;
                rest = &rest[end..];
            }
            // Still arriving; later markers must wait their turn.
            Scan::Incomplete => break,
        }
    }
    Extraction {
        records,
        rest: rest.to_owned(),
    }
}

/// Caller-maintained set of already-emitted record identities.
///
/// Guards against duplicate emission when overlapping buffer feeds re-parse a
/// record that was already surfaced. Lifetime: one streaming session.
#[derive(Debug, Default)]
pub struct SeenIds(HashSet<String>);

impl SeenIds {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id`, returning `true` if it was not seen before.
    ///
    /// Identities are keyed by their canonical JSON text, so `1` and `"1"`
    /// are distinct.
    pub fn insert(&mut self, id: &Value) -> bool {
        self.0.insert(id.to_string())
    }

    /// Number of distinct identities seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no identity has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
