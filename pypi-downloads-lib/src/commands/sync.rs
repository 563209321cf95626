use super::Host;
use super::common::{ColorMode, LogLevel, init_logging, progress_reporter};
use super::config::Config;
use crate::Result;
use crate::dataset::hub::{Client as HubClient, RepoId};
use crate::dataset::{DatasetStore, HubStore, LocalStore};
use crate::http::{ClientOptions, Throttler, build_client};
use crate::index::Provider as IndexProvider;
use crate::reader::DEFAULT_REPO;
use crate::refresh::{RefreshOptions, RefreshSummary, Refresher};
use crate::stats::Provider as StatsProvider;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use clap::builder::FalseyValueParser;
use ohno::bail;
use owo_colors::OwoColorize;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = "      sync";

/// Local dataset directory used in test mode when none is given.
pub const DEFAULT_TEST_DIR: &str = "pypi-downloads-test";

#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Hub dataset repository to publish to
    #[arg(long, value_name = "REPO", env = "PYPI_DOWNLOADS_REPO", default_value = DEFAULT_REPO)]
    pub repo: String,

    /// Proxy pool to route index and stats requests through (required outside test mode)
    #[arg(long, value_name = "URL", env = "PP_URL")]
    pub proxy_pool: Option<String>,

    /// Keep the dataset in a local directory and never touch the Hub
    #[arg(long, env = "PYPI_DOWNLOADS_TEST_MODE", value_parser = FalseyValueParser::new())]
    pub test_mode: bool,

    /// Keep the dataset in this directory instead of the Hub
    #[arg(long, value_name = "PATH")]
    pub local_dir: Option<Utf8PathBuf>,

    /// Path to configuration file (default is `pypi-downloads.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Fetch stats for at most this many stale packages
    #[arg(long, value_name = "N")]
    pub max_packages: Option<usize>,

    /// Hub access token used to publish the dataset
    #[arg(long, value_name = "TOKEN", env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Hub base URL (overrides `hub_endpoint` from the configuration file)
    #[arg(long, value_name = "URL", env = "HF_ENDPOINT")]
    pub hub_endpoint: Option<String>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: LogLevel,
}

/// Bring the dataset up to date and publish it.
pub async fn sync_command<H: Host>(host: &mut H, args: &SyncArgs) -> Result<()> {
    init_logging(args.log_level);

    let config = Config::load(Utf8Path::new("."), args.config.as_ref())?;

    if !args.test_mode && args.proxy_pool.is_none() {
        bail!("a proxy pool is required outside test mode; set PP_URL or pass --proxy-pool");
    }

    let throttler = Throttler::new(config.concurrency);
    let http = build_client(&ClientOptions {
        proxy_pool: args.proxy_pool.clone(),
        bearer_token: None,
    })?;

    let index = IndexProvider::new(http.clone(), Some(&config.index_url));
    let stats = StatsProvider::new(http, Some(&config.stats_base_url), Arc::clone(&throttler));
    let options = RefreshOptions {
        stale_threshold: config.stale_threshold,
        deploy_span: config.deploy_span,
        max_packages: args.max_packages,
    };

    let parts = Parts {
        index,
        stats,
        throttler,
        options,
    };

    let local_dir = args
        .local_dir
        .clone()
        .or_else(|| args.test_mode.then(|| Utf8PathBuf::from(DEFAULT_TEST_DIR)));

    let summary = if let Some(dir) = local_dir {
        log::info!(target: LOG_TARGET, "Keeping the dataset in '{dir}'");
        let store = LocalStore::open(dir.as_std_path()).await?;
        refresh_into(store, parts, args).await?
    } else {
        let Some(token) = &args.hf_token else {
            bail!("a Hub token is required to publish the dataset; set HF_TOKEN or pass --hf-token");
        };

        let hub_http = build_client(&ClientOptions {
            proxy_pool: None,
            bearer_token: Some(token.clone()),
        })?;
        let endpoint = args.hub_endpoint.as_deref().unwrap_or(&config.hub_endpoint);
        let store = HubStore::new(HubClient::new(hub_http, Some(endpoint), RepoId::parse(&args.repo)?));
        store.prepare().await?;
        refresh_into(store, parts, args).await?
    };

    report(host, &summary, args.color.for_stdout());
    Ok(())
}

struct Parts {
    index: IndexProvider,
    stats: StatsProvider,
    throttler: Arc<Throttler>,
    options: RefreshOptions,
}

async fn refresh_into<D: DatasetStore>(store: D, parts: Parts, args: &SyncArgs) -> Result<RefreshSummary> {
    let progress = progress_reporter(args.log_level, args.color);
    let refresher = Refresher::new(parts.index, parts.stats, store, parts.throttler, parts.options, progress);

    refresher.refresh_until(ctrl_c()).await
}

/// Exit code used when a second Ctrl-C abandons the final save.
const ABORT_EXIT_CODE: i32 = 130;

/// Completes on the first Ctrl-C. A second Ctrl-C ends the process right away.
async fn ctrl_c() {
    interrupt_then_abort(tokio::signal::ctrl_c, || std::process::exit(ABORT_EXIT_CODE)).await;
}

/// Completes on the first signal, then calls `abort` on the next one.
///
/// Never completes if the first wait fails, since the handler is then not installed.
async fn interrupt_then_abort<S, F, A>(mut signal: S, abort: A)
where
    S: FnMut() -> F + Send + 'static,
    F: Future<Output = std::io::Result<()>> + Send + 'static,
    A: FnOnce() + Send + 'static,
{
    if let Err(e) = signal().await {
        log::warn!(target: LOG_TARGET, "Unable to listen for Ctrl-C: {e}");
        core::future::pending::<()>().await;
    }

    log::warn!(target: LOG_TARGET, "Interrupted, saving progress. Press Ctrl-C again to quit without saving");

    let _ = tokio::spawn(async move {
        if signal().await.is_ok() {
            log::error!(target: LOG_TARGET, "Interrupted again, quitting without saving");
            abort();
        }
    });
}

fn report<H: Host>(host: &mut H, summary: &RefreshSummary, use_colors: bool) {
    let label = if summary.interrupted { "Interrupted" } else { "Synced" };
    if use_colors {
        let label = if summary.interrupted {
            label.yellow().bold().to_string()
        } else {
            label.green().bold().to_string()
        };
        let _ = writeln!(host.output(), "{label} {summary}");
    } else {
        let _ = writeln!(host.output(), "{label} {summary}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use core::time::Duration;
    use tokio::sync::{Notify, oneshot};

    fn signal_source(signals: &Arc<Notify>) -> impl FnMut() -> core::pin::Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>> + Send + 'static {
        let signals = Arc::clone(signals);
        move || {
            let signals = Arc::clone(&signals);
            Box::pin(async move {
                signals.notified().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_second_signal_aborts() {
        let signals = Arc::new(Notify::new());
        let (abort_tx, mut abort_rx) = oneshot::channel();

        let interrupt = tokio::spawn(interrupt_then_abort(signal_source(&signals), move || {
            let _ = abort_tx.send(());
        }));

        signals.notify_one();
        tokio::time::timeout(Duration::from_secs(5), interrupt).await.unwrap().unwrap();
        tokio::task::yield_now().await;
        let _ = abort_rx.try_recv().unwrap_err();

        signals.notify_one();
        tokio::time::timeout(Duration::from_secs(5), abort_rx).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_signal_never_interrupts() {
        let interrupt = interrupt_then_abort(|| async { Err(std::io::Error::other("no signal handler")) }, || {});
        let _ = tokio::time::timeout(Duration::from_millis(100), interrupt).await.unwrap_err();
    }

    #[test]
    fn test_report_plain() {
        let mut host = TestHost::new();
        let summary = RefreshSummary {
            indexed: 3,
            inserted: 1,
            stale: 2,
            valid: 1,
            invalid: 1,
            ..RefreshSummary::default()
        };
        report(&mut host, &summary, false);
        assert_eq!(
            host.output_text(),
            "Synced 3 indexed, 1 new, 2 stale, 1 valid, 1 invalid, 0 failed, 0 checkpoints\n"
        );
    }

    #[test]
    fn test_report_interrupted() {
        let mut host = TestHost::new();
        let summary = RefreshSummary {
            interrupted: true,
            ..RefreshSummary::default()
        };
        report(&mut host, &summary, false);
        assert!(host.output_text().starts_with("Interrupted "));
        assert!(host.output_text().contains("(interrupted)"));
    }
}
