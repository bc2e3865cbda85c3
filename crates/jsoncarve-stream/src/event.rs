//! Progress events emitted by a session to its caller.

use core::fmt;

use serde::Serialize;
use serde_json::Value;

/// The pipeline stage responsible for an error event.
///
/// Distinguishing `Parse`/`Validate` (bad model output) from `Render`
/// (document pipeline problem) and `Upstream` (generation service problem)
/// is what lets an operator read a failed session correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Opening or reading the upstream generation stream.
    Upstream,
    /// Per-chunk extraction of partial values.
    Extract,
    /// The final whole-transcript JSON parse.
    Parse,
    /// Structural validation of the parsed document.
    Validate,
    /// Rendering the validated document to a file.
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Upstream => "upstream",
            Stage::Extract => "extract",
            Stage::Parse => "parse",
            Stage::Validate => "validate",
            Stage::Render => "render",
        })
    }
}

/// One structured progress event.
///
/// Serializes as a tagged JSON object (`{"event": "record", ...}`) so it can
/// be forwarded to a client as-is, e.g. as a server-sent-event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Free-text progress narration.
    Status {
        /// Human-readable progress message.
        message: String,
    },
    /// One completed repeated record (records mode).
    Record {
        /// The fully decoded record.
        value: Value,
    },
    /// One completed top-level key (sections mode).
    Section {
        /// The key name.
        key: String,
        /// The key's fully decoded value.
        value: Value,
    },
    /// A fault, tagged with the responsible stage. Non-fatal errors do not
    /// end the session; fatal ones are followed by `Done { ok: false }`.
    Error {
        /// Pipeline stage that produced the fault.
        stage: Stage,
        /// Fault description; for parse failures this includes an excerpt
        /// of the raw transcript to aid operator diagnosis.
        message: String,
        /// Whether the session terminates because of this fault.
        fatal: bool,
    },
    /// The rendered document is ready for download.
    Final {
        /// Opaque token under which the file is registered.
        token: String,
        /// Caller-facing download reference.
        download_url: String,
        /// Suggested filename for the rendered document.
        filename: String,
    },
    /// Terminal event: emitted exactly once per session, success or failure.
    Done {
        /// Whether the session produced a downloadable document.
        ok: bool,
    },
}
