use crate::refresh::{FetchTally, Progress, RefreshPhase};
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Redraw rate while visible.
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

const FETCH_TEMPLATE: &str = "{prefix:>12.bold.cyan} [{bar:25}] {msg}";
const FETCH_TEMPLATE_NO_COLOR: &str = "{prefix:>12} [{bar:25}] {msg}";
const WAIT_TEMPLATE: &str = "{prefix:>12.bold.cyan} {spinner} {msg}";
const WAIT_TEMPLATE_NO_COLOR: &str = "{prefix:>12} {spinner} {msg}";

/// What the bar currently shows.
#[derive(Debug)]
enum View {
    Idle,
    Waiting { detail: String, since: Instant },
    Fetching(Arc<FetchTally>),
}

impl View {
    /// `(length, position, message)` for the next redraw.
    fn render(&self) -> (u64, u64, String) {
        match self {
            Self::Idle => (0, 0, String::new()),
            Self::Waiting { detail, since } => (0, 0, format!("{}s: {detail}", since.elapsed().as_secs())),
            Self::Fetching(tally) => (tally.total(), tally.processed(), tally.to_string()),
        }
    }
}

#[derive(Debug)]
struct Shared {
    visible_after: Instant,
    visible: AtomicBool,
    view: Mutex<View>,
}

impl Shared {
    fn set_view(&self, view: View) {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner) = view;
    }

    fn render(&self) -> (u64, u64, String) {
        self.view.lock().unwrap_or_else(PoisonError::into_inner).render()
    }
}

/// Shows refresh progress on stderr once a run outlasts a delay.
///
/// Waiting phases get a spinner with the elapsed time. The fetch stage gets a bar
/// with the tally of valid, missing, and failed packages.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    shared: Arc<Shared>,
    redraw_task: Arc<JoinHandle<()>>,
    use_colors: bool,
}

impl ProgressReporter {
    /// Create a reporter. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::hidden();
        let shared = Arc::new(Shared {
            visible_after: Instant::now() + delay,
            visible: AtomicBool::new(false),
            view: Mutex::new(View::Idle),
        });

        Self {
            redraw_task: Arc::new(tokio::spawn(redraw(bar.clone(), Arc::clone(&shared)))),
            bar,
            shared,
            use_colors,
        }
    }

    fn apply_style(&self, colored: &str, plain: &str, fetching: bool) {
        let template = if self.use_colors { colored } else { plain };
        let Ok(style) = ProgressStyle::with_template(template) else {
            return;
        };

        if fetching {
            self.bar.set_style(style.progress_chars("=> "));
        } else {
            self.bar.set_style(style.tick_chars("|/-\\ "));
        }
    }
}

impl Progress for ProgressReporter {
    fn phase(&self, phase: RefreshPhase, detail: &str) {
        self.shared.set_view(View::Waiting {
            detail: detail.to_string(),
            since: Instant::now(),
        });
        self.bar.set_prefix(phase.label());
        self.apply_style(WAIT_TEMPLATE, WAIT_TEMPLATE_NO_COLOR, false);
        self.bar.enable_steady_tick(REDRAW_INTERVAL);
    }

    fn fetching(&self, tally: Arc<FetchTally>) {
        self.bar.disable_steady_tick();
        self.bar.set_length(tally.total());
        self.bar.set_position(0);
        self.shared.set_view(View::Fetching(tally));
        self.bar.set_prefix("Fetching");
        self.apply_style(FETCH_TEMPLATE, FETCH_TEMPLATE_NO_COLOR, true);
    }

    fn done(&self) {
        self.redraw_task.abort();
        self.shared.set_view(View::Idle);
        if self.shared.visible.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("shared", &self.shared)
            .field("use_colors", &self.use_colors)
            .finish_non_exhaustive()
    }
}

/// Reveals the bar once the delay has passed, then redraws it from the current view.
async fn redraw(bar: ProgressBar, shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(REDRAW_INTERVAL);
    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        let _ = interval.tick().await;

        if !shared.visible.load(Ordering::Relaxed) {
            if Instant::now() < shared.visible_after {
                continue;
            }
            shared.visible.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        let (length, position, message) = shared.render();
        if length > 0 {
            bar.set_length(length);
            bar.set_position(position);
        }
        bar.set_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_phases_do_not_panic_while_hidden() {
        let reporter = ProgressReporter::new(Duration::from_hours(1), false);
        reporter.phase(RefreshPhase::Indexing, "fetching the package index");
        reporter.fetching(Arc::new(FetchTally::new(10)));
        reporter.phase(RefreshPhase::Saving, "saving dataset to memory");
        reporter.done();
        assert!(!reporter.shared.visible.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_fetch_view_follows_tally() {
        let reporter = ProgressReporter::new(Duration::from_hours(1), false);
        let tally = Arc::new(FetchTally::new(4));
        reporter.fetching(Arc::clone(&tally));

        tally.add_valid();
        tally.add_failed();
        let (length, position, message) = reporter.shared.render();
        assert_eq!((length, position), (4, 2));
        assert_eq!(message, "2/4 packages, 1 valid, 0 without data, 1 failed");

        reporter.done();
        assert_eq!(reporter.shared.render(), (0, 0, String::new()));
    }

    #[tokio::test]
    async fn test_waiting_view_names_the_phase_detail() {
        let reporter = ProgressReporter::new(Duration::from_hours(1), false);
        reporter.phase(RefreshPhase::Loading, "loading dataset from ./data");
        let (length, _, message) = reporter.shared.render();
        assert_eq!(length, 0);
        assert!(message.ends_with("s: loading dataset from ./data"), "{message}");
        reporter.done();
    }
}
