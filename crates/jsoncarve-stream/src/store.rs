//! Download-token registry: opaque token → rendered file.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

/// A rendered file registered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    /// Location of the rendered file on durable storage.
    pub path: PathBuf,
    /// Filename to present to the downloading client.
    pub filename: String,
}

/// Token → record mapping shared by concurrent sessions.
///
/// Write contract: insert-once. Tokens are unique per session and a record
/// is never mutated after insertion, so implementations only need each
/// insertion to be individually atomic. Lookup of an unknown token is
/// `None` (the HTTP layer maps it to a 404).
pub trait DownloadStore: Send + Sync {
    /// Registers `record` under `token`.
    fn put(&self, token: &str, record: DownloadRecord);
    /// Looks up a previously registered record.
    fn get(&self, token: &str) -> Option<DownloadRecord>;
}

impl<T: DownloadStore + ?Sized> DownloadStore for std::sync::Arc<T> {
    fn put(&self, token: &str, record: DownloadRecord) {
        (**self).put(token, record);
    }

    fn get(&self, token: &str) -> Option<DownloadRecord> {
        (**self).get(token)
    }
}

/// In-memory default store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, DownloadRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DownloadStore for MemoryStore {
    fn put(&self, token: &str, record: DownloadRecord) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.to_owned(), record);
    }

    fn get(&self, token: &str) -> Option<DownloadRecord> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }
}
