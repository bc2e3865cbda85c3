//! The per-request session state machine.

use futures_util::{Stream, StreamExt};
use jsoncarve::{KeySequence, Marker, SeenIds, extract_records, strip_code_fences};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    event::{SessionEvent, Stage},
    pipeline::{DocumentPipeline, PipelineError},
    store::{DownloadRecord, DownloadStore},
};

/// Failure reported by the upstream generation stream.
///
/// Produced by the caller's stream adapter; the session reports it as a
/// fatal `Upstream`-stage event. No retry is attempted at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream generation stream failed: {0}")]
pub struct UpstreamError(pub String);

/// Which extraction strategy a session runs over the transcript.
#[derive(Debug, Clone)]
pub enum ExtractMode {
    /// Carve every instance of a repeated record shape (e.g. quiz questions
    /// discriminated by `"id"`), emitting one [`SessionEvent::Record`] per
    /// completed record in arrival order.
    Records(Marker),
    /// Walk a fixed, ordered list of expected top-level keys (e.g. lesson
    /// plan sections), emitting one [`SessionEvent::Section`] per key in
    /// declared order.
    Sections(Vec<String>),
}

/// How a session run ended, from the driver's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SessionOutcome {
    /// Whole-transcript parse, validation, and render all succeeded; the
    /// rendered file is registered in the store.
    Completed,
    /// A fatal fault was reported; `Done { ok: false }` was delivered and
    /// nothing was registered.
    Failed,
    /// The event receiver went away mid-run; emission stopped and nothing
    /// was registered.
    Aborted,
}

enum Strategy {
    Records {
        marker: Marker,
        rest: String,
        seen: SeenIds,
    },
    Sections(KeySequence),
}

impl Strategy {
    fn new(mode: ExtractMode) -> Self {
        match mode {
            ExtractMode::Records(marker) => Strategy::Records {
                marker,
                rest: String::new(),
                seen: SeenIds::new(),
            },
            ExtractMode::Sections(keys) => Strategy::Sections(KeySequence::new(keys)),
        }
    }

    /// Runs one extraction pass over the newly arrived chunk, producing the
    /// per-value events plus any non-fatal extraction faults.
    fn absorb(&mut self, chunk: &str) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        match self {
            Strategy::Records { marker, rest, seen } => {
                rest.push_str(chunk);
                let extraction = extract_records(rest, marker);
                *rest = extraction.rest;
                for record in extraction.records {
                    match marker.identity(&record.value) {
                        Some(id) => {
                            if seen.insert(id) {
                                out.push(SessionEvent::Record {
                                    value: record.value,
                                });
                            }
                        }
                        None => out.push(SessionEvent::Error {
                            stage: Stage::Extract,
                            message: format!(
                                "extracted record has no \"{}\" field",
                                marker.key()
                            ),
                            fatal: false,
                        }),
                    }
                }
            }
            Strategy::Sections(sequence) => {
                for section in sequence.feed(chunk) {
                    out.push(SessionEvent::Section {
                        key: section.key,
                        value: section.value,
                    });
                }
            }
        }
        out
    }
}

/// One end-to-end streaming generation session.
///
/// Owns the transcript for its lifetime; nothing is shared across sessions
/// except the injected [`DownloadStore`].
pub struct Session<P, S> {
    strategy: Strategy,
    pipeline: P,
    store: S,
    download_route: String,
}

impl<P, S> Session<P, S>
where
    P: DocumentPipeline,
    S: DownloadStore,
{
    /// Creates a session with the default `/download` route prefix.
    pub fn new(mode: ExtractMode, pipeline: P, store: S) -> Self {
        Self {
            strategy: Strategy::new(mode),
            pipeline,
            store,
            download_route: "/download".to_owned(),
        }
    }

    /// Overrides the route prefix used to build `download_url` in the
    /// [`SessionEvent::Final`] event, e.g. `/download-lesson-plan`.
    #[must_use]
    pub fn with_download_route(mut self, route: impl Into<String>) -> Self {
        self.download_route = route.into();
        self
    }

    /// Drives the session to completion.
    ///
    /// Pulls chunks from `upstream` one at a time (the only suspension
    /// points are the chunk wait and event delivery), emits progress events
    /// over `events`, and finalizes once the stream ends. Exactly one
    /// [`SessionEvent::Done`] is delivered per run; if the receiver is
    /// dropped the run aborts promptly without registering anything.
    pub async fn run<U>(
        mut self,
        mut upstream: U,
        events: &mpsc::Sender<SessionEvent>,
    ) -> SessionOutcome
    where
        U: Stream<Item = Result<String, UpstreamError>> + Unpin,
    {
        if !send(
            events,
            SessionEvent::Status {
                message: "calling the generation model".to_owned(),
            },
        )
        .await
        {
            return SessionOutcome::Aborted;
        }

        let mut transcript = String::new();
        while let Some(item) = upstream.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(err) => {
                    warn!(error = %err, "upstream stream failed mid-session");
                    return self.fail(events, Stage::Upstream, err.to_string()).await;
                }
            };
            if chunk.is_empty() {
                continue;
            }
            transcript.push_str(&chunk);
            debug!(
                chunk_len = chunk.len(),
                transcript_len = transcript.len(),
                "chunk received"
            );
            for event in self.strategy.absorb(&chunk) {
                if let SessionEvent::Error { ref message, .. } = event {
                    warn!(message = %message, "non-fatal extraction fault");
                }
                if !send(events, event).await {
                    return SessionOutcome::Aborted;
                }
            }
        }

        if !send(
            events,
            SessionEvent::Status {
                message: "generation finished, assembling document".to_owned(),
            },
        )
        .await
        {
            return SessionOutcome::Aborted;
        }
        self.finalize(events, &transcript).await
    }

    async fn finalize(
        self,
        events: &mpsc::Sender<SessionEvent>,
        transcript: &str,
    ) -> SessionOutcome {
        let cleaned = strip_code_fences(transcript);
        let document: Value = match serde_json::from_str(cleaned) {
            Ok(document) => document,
            Err(err) => {
                // The whole raw transcript goes into the payload so an operator
                // can see what the model actually produced. Truncation failures
                // sit at the tail, so an excerpt would hide the failure site.
                return self
                    .fail(
                        events,
                        Stage::Parse,
                        format!("whole-transcript parse failed: {err}; raw output: {transcript}"),
                    )
                    .await;
            }
        };

        if let Err(err) = self.pipeline.validate(&document) {
            return self.fail(events, Stage::Validate, err.to_string()).await;
        }
        let rendered = match self.pipeline.render(&document) {
            Ok(rendered) => rendered,
            Err(err) => {
                let stage = match err {
                    PipelineError::Validate(_) => Stage::Validate,
                    PipelineError::Render(_) => Stage::Render,
                };
                return self.fail(events, stage, err.to_string()).await;
            }
        };

        let token = Uuid::new_v4().simple().to_string();
        self.store.put(
            &token,
            DownloadRecord {
                path: rendered.path,
                filename: rendered.filename.clone(),
            },
        );
        info!(token = %token, filename = %rendered.filename, "document registered for download");

        let final_event = SessionEvent::Final {
            download_url: format!("{}/{token}", self.download_route),
            token,
            filename: rendered.filename,
        };
        if !send(events, final_event).await {
            return SessionOutcome::Aborted;
        }
        if !send(events, SessionEvent::Done { ok: true }).await {
            return SessionOutcome::Aborted;
        }
        SessionOutcome::Completed
    }

    async fn fail(
        &self,
        events: &mpsc::Sender<SessionEvent>,
        stage: Stage,
        message: String,
    ) -> SessionOutcome {
        tracing::error!(stage = %stage, message = %message, "session failed");
        if !send(
            events,
            SessionEvent::Error {
                stage,
                message,
                fatal: true,
            },
        )
        .await
        {
            return SessionOutcome::Aborted;
        }
        if !send(events, SessionEvent::Done { ok: false }).await {
            return SessionOutcome::Aborted;
        }
        SessionOutcome::Failed
    }
}

/// Delivers one event; `false` means the receiver is gone and the session
/// should stop emitting.
async fn send(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) -> bool {
    events.send(event).await.is_ok()
}
