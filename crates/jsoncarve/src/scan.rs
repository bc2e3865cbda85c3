//! Balanced scan for one complete JSON value inside a stream-so-far.

use serde_json::Value;

/// Outcome of attempting to decode one JSON value from partial text.
///
/// `Incomplete` is the expected steady state while upstream is still
/// streaming: the caller retries after more text has been appended. A value
/// that is malformed for reasons other than truncation (a stray comma, a
/// mismatched close delimiter) is indistinguishable from a truncated one at
/// this layer and is also reported as `Incomplete`; hard failure is deferred
/// to the final whole-document parse.
#[derive(Debug, Clone, PartialEq)]
pub enum Scan {
    /// A syntactically complete value begins at the requested offset.
    Complete {
        /// The decoded value.
        value: Value,
        /// Byte offset of the first character after the value.
        end: usize,
    },
    /// The value has not finished arriving (or cannot be decoded yet).
    Incomplete,
}

/// Attempts to decode exactly one JSON value beginning at byte offset
/// `start`, ignoring any trailing text after the value.
///
/// Leading JSON whitespace at `start` is skipped. Offsets are byte offsets
/// into `text`; `start` past the end of `text` yields [`Scan::Incomplete`].
///
/// A bare number that runs to the end of `text` is reported as `Incomplete`
/// even though the digits seen so far form a valid number: more digits may
/// still arrive, so a number is only complete once a non-number byte follows
/// it. Container and string values do not have this ambiguity.
///
/// ```
/// use jsoncarve::{Scan, scan_value};
/// use serde_json::json;
///
/// assert_eq!(
///     scan_value(r#"{"id": 1}, {"id"#, 0),
///     Scan::Complete { value: json!({"id": 1}), end: 9 },
/// );
/// assert_eq!(scan_value(r#"{"id": 1, "qu"#, 0), Scan::Incomplete);
/// ```
#[must_use]
pub fn scan_value(text: &str, start: usize) -> Scan {
    let bytes = text.as_bytes();
    let mut at = start;
    while at < bytes.len() && matches!(bytes[at], b' ' | b'\t' | b'\n' | b'\r') {
        at += 1;
    }
    let Some(len) = extent(&bytes[at.min(bytes.len())..]) else {
        return Scan::Incomplete;
    };
    match serde_json::from_str::<Value>(&text[at..at + len]) {
        Ok(value) => Scan::Complete {
            value,
            end: at + len,
        },
        Err(_) => Scan::Incomplete,
    }
}

/// Returns the byte length of the first complete JSON value in `bytes`, or
/// `None` if the value is still truncated.
///
/// Balance tracking only: the extent may still fail to decode (e.g. `{,}` is
/// balanced but invalid), which the caller folds into `Incomplete`. Walking
/// bytes is UTF-8 safe here because every byte this scan inspects is ASCII
/// and multi-byte sequences never contain ASCII bytes.
fn extent(bytes: &[u8]) -> Option<usize> {
    match bytes.first()? {
        b'{' | b'[' => container_extent(bytes),
        b'"' => string_extent(bytes),
        b't' => literal_extent(bytes, b"true"),
        b'f' => literal_extent(bytes, b"false"),
        b'n' => literal_extent(bytes, b"null"),
        b'-' | b'0'..=b'9' => number_extent(bytes),
        _ => None,
    }
}

fn container_extent(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn string_extent(bytes: &[u8]) -> Option<usize> {
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(1) {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            return Some(i + 1);
        }
    }
    None
}

fn literal_extent(bytes: &[u8], literal: &[u8]) -> Option<usize> {
    if bytes.len() >= literal.len() {
        bytes.starts_with(literal).then_some(literal.len())
    } else {
        // A strict prefix of the literal: still arriving.
        None
    }
}

fn number_extent(bytes: &[u8]) -> Option<usize> {
    let len = bytes
        .iter()
        .position(|b| !matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E'))?;
    // No terminating byte seen means the number may still be growing.
    (len > 0).then_some(len)
}
