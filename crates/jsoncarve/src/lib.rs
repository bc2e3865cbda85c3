//! Incremental extraction of complete JSON values from a growing, partially
//! received text buffer.
//!
//! The intended producer is a large-language-model token stream that, once it
//! ends, forms one syntactically valid JSON document. While the stream is
//! still open the transcript is arbitrarily truncated, and chunk boundaries
//! do not align with JSON token boundaries. This crate opportunistically
//! carves complete sub-values out of that partial text so a consumer can act
//! on them before the document finishes:
//!
//! - [`scan_value`] decodes exactly one JSON value at a byte offset,
//!   tolerating any trailing text, and reports truncation as the first-class
//!   outcome [`Scan::Incomplete`] rather than an error.
//! - [`KeyAnchor`] / [`extract_by_key`] pull out the value of a named
//!   top-level field (`"key": {...}`) as soon as it has closed, even though
//!   the surrounding object has not.
//! - [`Marker`] / [`extract_records`] carve every complete instance of a
//!   repeated object shape (recognized by a discriminator field such as
//!   `"id"`) out of the buffer, returning the unconsumed remainder.
//! - [`KeySequence`] drives a fixed, ordered list of expected top-level keys,
//!   emitting each key's value exactly once in declared order while keeping
//!   only a bounded tail of the transcript.
//!
//! All operations are pure, synchronous computations over in-memory strings;
//! nothing here suspends or performs I/O.

mod fence;
mod key;
mod marker;
mod scan;
mod sequence;


pub use fence::strip_code_fences;
pub use key::{KeyAnchor, KeyExtract, extract_by_key};
pub use marker::{Extracted, Extraction, Marker, SeenIds, extract_records};
pub use scan::{Scan, scan_value};
pub use sequence::{KeySequence, SectionValue};
