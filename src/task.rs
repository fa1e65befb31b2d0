//! Structured handles for background population tasks.

use crate::protein_record::ProteinRecord;
use std::thread::JoinHandle;

/// Mutation produced by a finished background task. Applied on the caller's
/// thread, so tasks never touch the record concurrently.
pub type RecordPatch = Box<dyn FnOnce(&mut ProteinRecord) + Send>;

/// A named background population task (gnomAD scores, partner annotations and
/// the like, produced by external collaborators). The owning record joins
/// every tracked task before persisting, so snapshots never capture a
/// half-populated record.
#[derive(Debug)]
pub struct BackgroundTask {
    pub name: String,
    handle: JoinHandle<RecordPatch>,
}

impl BackgroundTask {
    /// Run `work` on its own thread; the returned patch is applied when the
    /// record completes its tasks.
    pub fn spawn<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> RecordPatch + Send + 'static,
    {
        Self {
            name: name.into(),
            handle: std::thread::spawn(work),
        }
    }

    /// Block until the task finishes. A panicked task yields a message
    /// instead of poisoning the record.
    pub fn join(self) -> Result<RecordPatch, String> {
        let BackgroundTask { name, handle } = self;
        handle
            .join()
            .map_err(|_| format!("Background task '{name}' panicked"))
    }
}
