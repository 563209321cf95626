use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Bounds how many stats requests are in flight and lets the pipeline halt dispatch.
///
/// Wrap in an `Arc` via [`Throttler::new`], then call [`Throttler::acquire`] before
/// each unit of work. At most `max_concurrent` tasks run simultaneously.
///
/// Dispatch can be halted two ways:
///
/// - [`Throttler::pause_for`] halts for a fixed duration, e.g. after a rate-limit response.
///   When several timed pauses overlap, the longest one wins.
/// - [`Throttler::pause`] halts until the returned [`PauseGuard`] is dropped, e.g. while a
///   checkpoint is being written.
///
/// The throttler is paused while either kind is active.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    paused: AtomicBool,
    resume: Notify,
    state: Mutex<PauseState>,
}

#[derive(Debug, Default)]
struct PauseState {
    /// When the current timed pause should expire.
    resume_at: Option<Instant>,

    /// Number of live [`PauseGuard`]s.
    holds: usize,
}

impl PauseState {
    const fn is_paused(&self) -> bool {
        self.resume_at.is_some() || self.holds > 0
    }
}

/// Keeps a [`Throttler`] paused until dropped.
#[derive(Debug)]
#[must_use = "the throttler resumes as soon as the guard is dropped"]
pub struct PauseGuard {
    throttler: Arc<Throttler>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        let still_paused = {
            let mut state = self.throttler.lock_state();
            state.holds = state.holds.saturating_sub(1);
            state.is_paused()
        };

        if !still_paused {
            self.throttler.resume_dispatch();
        }
    }
}

impl Throttler {
    /// Minimum extension required for a new timed pause to override an active one.
    /// Keeps near-simultaneous callers that saw the same rate-limit reset from each
    /// "winning" because of tiny `Instant::now()` drift.
    const MIN_PAUSE_EXTENSION: Duration = Duration::from_secs(1);

    /// Create a new throttler that allows at most `max_concurrent` tasks at a time.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            paused: AtomicBool::new(false),
            resume: Notify::new(),
            state: Mutex::new(PauseState::default()),
        })
    }

    /// Wait until unpaused, then acquire a concurrency slot.
    ///
    /// The returned permit must be held for the duration of the work. When it
    /// is dropped, the slot becomes available for another task.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        loop {
            let notified = self.resume.notified();
            if self.paused.load(Ordering::Acquire) {
                notified.await;
                continue;
            }

            // The semaphore is owned by this throttler and never closed.
            if let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await {
                return permit;
            }
        }
    }

    /// Returns whether the throttler is currently paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause dispatching until the returned guard is dropped.
    ///
    /// Tasks already running are not interrupted.
    pub fn pause(self: &Arc<Self>) -> PauseGuard {
        self.lock_state().holds += 1;
        self.paused.store(true, Ordering::Release);

        PauseGuard {
            throttler: Arc::clone(self),
        }
    }

    /// Pause dispatching for `duration`, then automatically resume.
    ///
    /// Tasks already running are not interrupted. Tasks waiting in [`acquire`](Self::acquire)
    /// remain parked until the duration elapses. If a timed pause with a similar
    /// or longer duration is already active, this call is a no-op and returns `false`.
    /// Returns `true` only when a new pause is actually established.
    pub fn pause_for(self: &Arc<Self>, duration: Duration) -> bool {
        let new_resume_at = Instant::now() + duration;

        {
            let mut state = self.lock_state();
            if state
                .resume_at
                .is_some_and(|existing| existing + Self::MIN_PAUSE_EXTENSION >= new_resume_at)
            {
                return false;
            }
            state.resume_at = Some(new_resume_at);
        }

        self.paused.store(true, Ordering::Release);
        let this = Arc::clone(self);
        drop(tokio::spawn(async move {
            tokio::time::sleep(duration).await;

            let should_resume = {
                let mut state = this.lock_state();
                if state.resume_at.is_some_and(|t| Instant::now() >= t) {
                    state.resume_at = None;
                    !state.is_paused()
                } else {
                    // a longer pause was scheduled after us
                    false
                }
            };

            if should_resume {
                this.resume_dispatch();
            }
        }));

        true
    }

    fn resume_dispatch(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume.notify_waiters();
    }

    fn lock_state(&self) -> MutexGuard<'_, PauseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
