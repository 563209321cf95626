use super::Snapshot;
use crate::Result;

/// Somewhere a snapshot lives between runs.
pub trait DatasetStore: Send + Sync {
    /// Load the last saved snapshot, or an empty one when nothing was saved yet.
    fn load(&self) -> impl Future<Output = Result<Snapshot>> + Send;

    /// Replace the saved snapshot with `snapshot`.
    ///
    /// On failure the caller still owns the in-memory snapshot and may try again.
    fn save(&self, snapshot: &Snapshot) -> impl Future<Output = Result<()>> + Send;

    /// A short human-readable location, used in logs.
    fn location(&self) -> String;
}
