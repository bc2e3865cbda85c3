//! Validator/renderer collaborator interface.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// A file produced by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Where the renderer wrote the file.
    pub path: PathBuf,
    /// Filename to present to the downloading client.
    pub filename: String,
}

/// Failure from the document pipeline, split by stage so the session can
/// tag the error event correctly.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The parsed document does not match the expected shape.
    #[error("validation failed: {0}")]
    Validate(String),
    /// The validated document could not be rendered to a file.
    #[error("render failed: {0}")]
    Render(String),
}

/// Validates a fully parsed JSON document and renders it to a file.
///
/// Both calls are synchronous: the session invokes them once, after the
/// upstream stream has ended. The session does not attempt repair on
/// validation failure and never registers a file unless `render` succeeded.
pub trait DocumentPipeline: Send + Sync {
    /// Checks the document against the expected shape.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Validate`] when the document is structurally wrong.
    fn validate(&self, document: &Value) -> Result<(), PipelineError>;

    /// Produces a file on durable storage from a validated document.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Render`] when the file cannot be produced.
    fn render(&self, document: &Value) -> Result<RenderedDocument, PipelineError>;
}

impl<T: DocumentPipeline + ?Sized> DocumentPipeline for std::sync::Arc<T> {
    fn validate(&self, document: &Value) -> Result<(), PipelineError> {
        (**self).validate(document)
    }

    fn render(&self, document: &Value) -> Result<RenderedDocument, PipelineError> {
        (**self).render(document)
    }
}
