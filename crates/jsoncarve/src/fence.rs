//! Markdown code-fence stripping for model transcripts.

/// Strips a surrounding markdown code fence from a finished transcript.
///
/// Generation models are instructed to reply with bare JSON, but some wrap
/// the document in ```` ```json ```` fences anyway. Run this over the full
/// transcript before the final whole-document parse.
///
/// ```
/// use jsoncarve::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
/// ```
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```json") {
        t = rest;
    } else if let Some(rest) = t.strip_prefix("```") {
        t = rest;
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.trim()
}
