//! Orchestration of one end-to-end streaming generation session.
//!
//! A [`Session`] pulls text chunks from an upstream generation stream,
//! carves complete JSON sub-values out of the growing transcript with
//! [`jsoncarve`], surfaces them as structured [`SessionEvent`]s over a
//! channel, and on stream end performs the single whole-transcript
//! parse → validate → render pass, registering the rendered file in a
//! [`DownloadStore`] under an opaque token.
//!
//! The upstream client, document validator/renderer, and token store are
//! collaborators behind narrow traits; this crate owns only the session
//! state machine (`Starting → Streaming → Finalizing → Completed/Failed`)
//! and its event contract: every run delivers exactly one terminal
//! [`SessionEvent::Done`] carrying an explicit success flag, unless the
//! event receiver goes away first.

mod event;
mod pipeline;
mod session;
mod store;

pub use event::{SessionEvent, Stage};
pub use pipeline::{DocumentPipeline, PipelineError, RenderedDocument};
pub use session::{ExtractMode, Session, SessionOutcome, UpstreamError};
pub use store::{DownloadRecord, DownloadStore, MemoryStore};
