use super::staleness::{DEFAULT_STALE_THRESHOLD, merge_index, select_stale};
use super::{FetchTally, Progress, RefreshPhase, RefreshSummary};
use crate::Result;
use crate::dataset::{DatasetStore, Snapshot};
use crate::http::Throttler;
use crate::index::IndexSource;
use crate::stats::{StatsOutcome, StatsSource};
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::EnrichableExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

const LOG_TARGET: &str = "   refresh";

/// Default minimum time between two checkpoints.
pub const DEFAULT_DEPLOY_SPAN: Duration = Duration::from_secs(300);

const COMPLETION_QUEUE_CAPACITY: usize = 256;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A finished fetch on its way from a worker to the coordinator.
type Completion = (String, Result<StatsOutcome>);

/// Tuning knobs of a refresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Fetched records older than this are fetched again.
    pub stale_threshold: Duration,

    /// Minimum time between two checkpoints.
    pub deploy_span: Duration,

    /// Fetch at most this many stale records.
    pub max_packages: Option<usize>,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            deploy_span: DEFAULT_DEPLOY_SPAN,
            max_packages: None,
        }
    }
}

/// Brings a dataset up to date with the package index and the stats service.
///
/// One run:
///
/// 1. fetches the index and loads the last saved snapshot
/// 2. adds a pending record for every newly indexed package
/// 3. fetches stats for every stale record, with at most as many requests in flight
///    as the throttler allows
/// 4. saves a checkpoint whenever `deploy_span` has passed since the last one and
///    there is something new to save
/// 5. saves once more at the end if anything changed since the last save
///
/// The coordinator owns the snapshot outright; workers only report results back
/// over a channel.
pub struct Refresher<I, S, D> {
    index: I,
    stats: Arc<S>,
    store: D,
    throttler: Arc<Throttler>,
    options: RefreshOptions,
    progress: Arc<dyn Progress>,
    clock: Clock,
}

impl<I, S, D> core::fmt::Debug for Refresher<I, S, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Refresher")
            .field("throttler", &self.throttler)
            .field("options", &self.options)
            .field("progress", &"<dyn Progress>")
            .finish_non_exhaustive()
    }
}

impl<I, S, D> Refresher<I, S, D>
where
    I: IndexSource,
    S: StatsSource,
    D: DatasetStore,
{
    /// Create a refresher. `throttler` bounds concurrency; the stats source may share it.
    pub fn new(index: I, stats: S, store: D, throttler: Arc<Throttler>, options: RefreshOptions, progress: impl Progress + 'static) -> Self {
        Self {
            index,
            stats: Arc::new(stats),
            store,
            throttler,
            options,
            progress: Arc::new(progress),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used to stamp fetched records and judge staleness.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub const fn store(&self) -> &D {
        &self.store
    }

    /// Run a full refresh.
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        self.refresh_until(core::future::pending()).await
    }

    /// Run a refresh that winds down once `interrupt` completes.
    ///
    /// After the interrupt no new fetch starts. Fetches already in flight finish and
    /// are applied, and the final save still happens.
    pub async fn refresh_until(&self, interrupt: impl Future<Output = ()>) -> Result<RefreshSummary> {
        let mut summary = RefreshSummary::default();

        self.progress.phase(RefreshPhase::Indexing, "fetching the package index");
        let entries = match self.index.fetch_index().await {
            Ok(entries) => entries,
            Err(e) => {
                self.progress.done();
                return Err(e.enrich("could not fetch the package index"));
            }
        };
        summary.indexed = entries.len();

        self.progress.phase(RefreshPhase::Loading, &format!("loading dataset from {}", self.store.location()));
        let mut current = match self.store.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.progress.done();
                return Err(e.enrich_with(|| format!("could not load the dataset from '{}'", self.store.location())));
            }
        };

        let (inserted, adopted_urls) = merge_index(&mut current, entries);
        summary.inserted = inserted;
        let mut dirty = inserted > 0 || adopted_urls > 0;

        let now = (self.clock)();
        let stale = select_stale(&current, now, self.options.stale_threshold, self.options.max_packages);
        summary.stale = stale.len();

        log::info!(
            target: LOG_TARGET,
            "{} records, {} new, {} stale",
            current.len(),
            summary.inserted,
            summary.stale
        );

        let tally = Arc::new(FetchTally::new(stale.len() as u64));
        self.progress.fetching(Arc::clone(&tally));

        let (tx, mut rx) = mpsc::channel::<Completion>(COMPLETION_QUEUE_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let dispatcher = tokio::spawn(dispatch(stale, Arc::clone(&self.stats), Arc::clone(&self.throttler), tx, stop_rx));

        let mut interrupt = core::pin::pin!(interrupt);
        let mut last_checkpoint = Instant::now();

        loop {
            let completion = tokio::select! {
                completion = rx.recv() => completion,
                () = &mut interrupt, if !summary.interrupted => {
                    log::warn!(target: LOG_TARGET, "Interrupted, waiting for in-flight requests to finish");
                    summary.interrupted = true;
                    let _ = stop_tx.send(true);
                    continue;
                }
            };

            let Some((name, result)) = completion else {
                break;
            };

            dirty |= self.apply(&mut current, &mut summary, &tally, &name, result);

            if dirty && last_checkpoint.elapsed() >= self.options.deploy_span {
                if self.checkpoint(&current).await {
                    summary.checkpoints += 1;
                    tally.add_checkpoint();
                    dirty = false;
                }
                last_checkpoint = Instant::now();
            }
        }

        if let Err(e) = dispatcher.await {
            log::warn!(target: LOG_TARGET, "Dispatcher task failed: {e}");
        }

        if dirty {
            self.progress.phase(RefreshPhase::Saving, &format!("saving dataset to {}", self.store.location()));

            let saved = self.store.save(&current).await;
            self.progress.done();
            saved.map_err(|e| e.enrich_with(|| format!("could not save the dataset to '{}'", self.store.location())))?;
            summary.final_save = true;
        } else {
            self.progress.done();
            log::info!(target: LOG_TARGET, "Nothing changed since the last save");
        }

        log::info!(target: LOG_TARGET, "Refresh complete: {summary}");
        Ok(summary)
    }

    /// Fold one finished fetch into the snapshot. Returns whether the snapshot changed.
    fn apply(&self, current: &mut Snapshot, summary: &mut RefreshSummary, tally: &FetchTally, name: &str, result: Result<StatsOutcome>) -> bool {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch stats for '{name}': {e:#}");
                summary.failed += 1;
                tally.add_failed();
                return false;
            }
        };

        let Some(record) = current.get_mut(name) else {
            return false;
        };

        record.apply(outcome, (self.clock)());
        if let Some(counts) = outcome.counts() {
            log::debug!(target: LOG_TARGET, "'{name}': {counts}");
            summary.valid += 1;
            tally.add_valid();
        } else {
            log::debug!(target: LOG_TARGET, "No data found for '{name}'");
            summary.invalid += 1;
            tally.add_invalid();
        }

        true
    }

    /// Save an intermediate snapshot with dispatch paused. Returns whether it was saved.
    async fn checkpoint(&self, current: &Snapshot) -> bool {
        let _pause = self.throttler.pause();

        log::info!(
            target: LOG_TARGET,
            "Checkpointing {} records to '{}'",
            current.len(),
            self.store.location()
        );

        match self.store.save(current).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not save checkpoint, will retry at the next one: {e:#}");
                false
            }
        }
    }
}

/// Start one worker per name, each holding a throttler permit for its fetch.
///
/// Stops starting workers once `stop` flips. Returns how many were started.
async fn dispatch<S: StatsSource>(
    names: Vec<String>,
    stats: Arc<S>,
    throttler: Arc<Throttler>,
    tx: mpsc::Sender<Completion>,
    mut stop: watch::Receiver<bool>,
) -> usize {
    let mut started = 0;

    for name in names {
        if *stop.borrow_and_update() {
            break;
        }

        let permit = tokio::select! {
            biased;
            _ = stop.changed() => break,
            permit = throttler.acquire() => permit,
        };

        let stats = Arc::clone(&stats);
        let tx = tx.clone();
        drop(tokio::spawn(async move {
            let result = stats.fetch_stats(&name).await;
            drop(permit);
            let _ = tx.send((name, result)).await;
        }));

        started += 1;
    }

    log::debug!(target: LOG_TARGET, "Dispatched {started} fetches");
    started
}
