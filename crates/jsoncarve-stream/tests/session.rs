use std::{path::PathBuf, sync::Arc};

use jsoncarve::Marker;
use jsoncarve_stream::{
    DocumentPipeline, DownloadStore, ExtractMode, MemoryStore, PipelineError, RenderedDocument,
    Session, SessionEvent, SessionOutcome, Stage, UpstreamError,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// Stand-in for the docx validator/renderer collaborators.
#[derive(Default)]
struct StubPipeline {
    reject_validation: bool,
    fail_render: bool,
    output_dir: Option<PathBuf>,
}

impl DocumentPipeline for StubPipeline {
    fn validate(&self, document: &Value) -> Result<(), PipelineError> {
        if self.reject_validation {
            return Err(PipelineError::Validate("questions list is missing".into()));
        }
        if document.is_object() {
            Ok(())
        } else {
            Err(PipelineError::Validate("document is not an object".into()))
        }
    }

    fn render(&self, _document: &Value) -> Result<RenderedDocument, PipelineError> {
        if self.fail_render {
            return Err(PipelineError::Render("pandoc exited with status 1".into()));
        }
        let path = match &self.output_dir {
            Some(dir) => {
                let path = dir.join("quiz.docx");
                std::fs::write(&path, b"docx bytes").map_err(|e| PipelineError::Render(e.to_string()))?;
                path
            }
            None => PathBuf::from("/tmp/quiz.docx"),
        };
        Ok(RenderedDocument {
            path,
            filename: "quiz.docx".into(),
        })
    }
}

fn ok_chunks<S: AsRef<str>>(parts: &[S]) -> Vec<Result<String, UpstreamError>> {
    parts.iter().map(|p| Ok(p.as_ref().to_owned())).collect()
}

async fn run_collect(
    mode: ExtractMode,
    pipeline: StubPipeline,
    store: Arc<MemoryStore>,
    chunks: Vec<Result<String, UpstreamError>>,
) -> (SessionOutcome, Vec<SessionEvent>) {
    let (tx, mut rx) = mpsc::channel(64);
    let session = Session::new(mode, pipeline, store);
    let outcome = session.run(tokio_stream::iter(chunks), &tx).await;
    drop(tx);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (outcome, events)
}

fn record_ids(events: &[SessionEvent]) -> Vec<Value> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Record { value } => Some(value["id"].clone()),
            _ => None,
        })
        .collect()
}

fn done_flags(events: &[SessionEvent]) -> Vec<bool> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Done { ok } => Some(*ok),
            _ => None,
        })
        .collect()
}

// "id" sorts first within each record, so the serialized records open with
// the `{"id":` marker text.
fn quiz_document() -> String {
    json!({
        "name": "Unit test quiz",
        "questions": [
            {"id": 1, "question": "What is 2 + 2?"},
            {"id": 2, "question": "What is 3 * 3?"},
        ],
    })
    .to_string()
}

/// Splits `text` into `n` chunks of roughly equal size.
fn split_into(text: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = chars.len().div_ceil(n);
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

#[tokio::test]
async fn quiz_streaming_emits_records_then_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    let doc = quiz_document();
    let (outcome, events) = run_collect(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline {
            output_dir: Some(dir.path().to_path_buf()),
            ..StubPipeline::default()
        },
        Arc::clone(&store),
        ok_chunks(&split_into(&doc, 5)),
    )
    .await;

    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(record_ids(&events), [json!(1), json!(2)]);
    assert_eq!(done_flags(&events), [true]);

    let (token, url) = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::Final {
                token,
                download_url,
                ..
            } => Some((token.clone(), download_url.clone())),
            _ => None,
        })
        .expect("a final event");
    assert_eq!(url, format!("/download/{token}"));
    let record = store.get(&token).expect("registered download");
    assert_eq!(record.filename, "quiz.docx");
    assert!(record.path.exists());
}

#[tokio::test]
async fn records_are_not_duplicated_across_chunk_boundaries() {
    let store = Arc::new(MemoryStore::new());
    let doc = quiz_document();
    // One chunk per character: maximal opportunity for re-scanning.
    let chunks: Vec<Result<String, UpstreamError>> =
        doc.chars().map(|c| Ok(c.to_string())).collect();
    let (outcome, events) = run_collect(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline::default(),
        store,
        chunks,
    )
    .await;

    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(record_ids(&events), [json!(1), json!(2)]);
}

#[tokio::test]
async fn malformed_tail_fails_after_surfacing_complete_records() {
    let store = Arc::new(MemoryStore::new());
    // Drop the last 3 characters, simulating a truncated connection. The
    // trailing "name" field absorbs the damage, so both records are intact.
    // The name is padded past a kilobyte so the failure site sits far from
    // the transcript's head.
    let doc = format!(
        r#"{{"questions": [{{"id": 1, "question": "Q1?"}}, {{"id": 2, "question": "Q2?"}}], "name": "{}"}}"#,
        "unit on fractions ".repeat(80),
    );
    let truncated = &doc[..doc.len() - 3];
    let (outcome, events) = run_collect(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline::default(),
        Arc::clone(&store),
        ok_chunks(&split_into(truncated, 4)),
    )
    .await;

    assert_eq!(outcome, SessionOutcome::Failed);
    assert_eq!(record_ids(&events), [json!(1), json!(2)]);
    assert_eq!(done_flags(&events), [false]);
    let parse_error = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::Error {
                stage: Stage::Parse,
                message,
                fatal: true,
            } => Some(message.clone()),
            _ => None,
        })
        .expect("a fatal parse error");
    // The whole raw transcript is preserved in the payload for diagnosis,
    // including the tail where the truncation actually happened.
    assert!(parse_error.contains("raw output"));
    assert!(parse_error.ends_with(truncated));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Final { .. })));
}

#[tokio::test]
async fn empty_upstream_fails_with_exactly_one_done() {
    let (outcome, events) = run_collect(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline::default(),
        Arc::new(MemoryStore::new()),
        Vec::new(),
    )
    .await;

    assert_eq!(outcome, SessionOutcome::Failed);
    assert_eq!(done_flags(&events), [false]);
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Error {
            stage: Stage::Parse,
            fatal: true,
            ..
        }
    )));
}

#[tokio::test]
async fn upstream_fault_is_fatal_and_tagged() {
    let (outcome, events) = run_collect(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline::default(),
        Arc::new(MemoryStore::new()),
        vec![
            Ok(r#"{"questions": [{"id": 1, "question": "Q1?"}"#.to_owned()),
            Err(UpstreamError("connection reset".into())),
        ],
    )
    .await;

    assert_eq!(outcome, SessionOutcome::Failed);
    assert_eq!(done_flags(&events), [false]);
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Error {
            stage: Stage::Upstream,
            fatal: true,
            ..
        }
    )));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Final { .. })));
}

#[tokio::test]
async fn sections_stream_in_declared_order_despite_fences() {
    let store = Arc::new(MemoryStore::new());
    let doc = json!({
        "meta": {"subject": "Math"},
        "objectives": {"knowledge": ["fractions"]},
        "resources": ["textbook"],
    })
    .to_string();
    let fenced = format!("```json\n{doc}\n```");
    let keys = vec![
        "meta".to_owned(),
        "objectives".to_owned(),
        "resources".to_owned(),
    ];
    let (outcome, events) = run_collect(
        ExtractMode::Sections(keys.clone()),
        StubPipeline::default(),
        store,
        ok_chunks(&split_into(&fenced, 7)),
    )
    .await;

    assert_eq!(outcome, SessionOutcome::Completed);
    let emitted: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Section { key, .. } => Some(key.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(emitted, keys);
    assert_eq!(done_flags(&events), [true]);
}

#[tokio::test]
async fn validation_and_render_failures_are_tagged_distinctly() {
    let doc = quiz_document();

    let (outcome, events) = run_collect(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline {
            reject_validation: true,
            ..StubPipeline::default()
        },
        Arc::new(MemoryStore::new()),
        ok_chunks(&[&doc]),
    )
    .await;
    assert_eq!(outcome, SessionOutcome::Failed);
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Error {
            stage: Stage::Validate,
            fatal: true,
            ..
        }
    )));

    let (outcome, events) = run_collect(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline {
            fail_render: true,
            ..StubPipeline::default()
        },
        Arc::new(MemoryStore::new()),
        ok_chunks(&[&doc]),
    )
    .await;
    assert_eq!(outcome, SessionOutcome::Failed);
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Error {
            stage: Stage::Render,
            fatal: true,
            ..
        }
    )));
    assert_eq!(done_flags(&events), [false]);
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Final { .. })));
}

#[tokio::test]
async fn custom_download_route_appears_in_final_event() {
    let (tx, mut rx) = mpsc::channel(64);
    let session = Session::new(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline::default(),
        Arc::new(MemoryStore::new()),
    )
    .with_download_route("/download-lesson-plan");
    let outcome = session
        .run(tokio_stream::iter(ok_chunks(&[&quiz_document()])), &tx)
        .await;
    drop(tx);
    assert_eq!(outcome, SessionOutcome::Completed);

    let mut saw_final = false;
    while let Some(event) = rx.recv().await {
        if let SessionEvent::Final { download_url, token, .. } = event {
            assert_eq!(download_url, format!("/download-lesson-plan/{token}"));
            saw_final = true;
        }
    }
    assert!(saw_final);
}

#[tokio::test]
async fn dropped_receiver_aborts_without_registration() {
    let store = Arc::new(MemoryStore::new());
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let session = Session::new(
        ExtractMode::Records(Marker::new("id")),
        StubPipeline::default(),
        Arc::clone(&store),
    );
    let outcome = session
        .run(tokio_stream::iter(ok_chunks(&[&quiz_document()])), &tx)
        .await;
    assert_eq!(outcome, SessionOutcome::Aborted);
}
