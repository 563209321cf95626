//! The staleness-driven refresh pipeline.
//!
//! [`Refresher`] ties an [`IndexSource`](crate::index::IndexSource), a
//! [`StatsSource`](crate::stats::StatsSource), and a
//! [`DatasetStore`](crate::dataset::DatasetStore) together: it adds newly indexed
//! packages to the dataset, re-fetches records that are missing or older than the
//! stale threshold, and saves the result, checkpointing along the way.

mod progress;
mod refresh_summary;
mod refresher;
mod staleness;

pub use progress::{FetchTally, Progress, RefreshPhase};
pub use refresh_summary::RefreshSummary;
pub use refresher::{DEFAULT_DEPLOY_SPAN, RefreshOptions, Refresher};
pub use staleness::{DEFAULT_STALE_THRESHOLD, is_stale, merge_index, select_stale};
