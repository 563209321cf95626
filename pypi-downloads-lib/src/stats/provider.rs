use super::{DownloadCounts, StatsOutcome, StatsSource};
use crate::Result;
use crate::http::{DEFAULT_RATE_LIMIT_DELAY, Throttler, parse_retry_after, resilient_get};
use core::time::Duration;
use ohno::{IntoAppError, app_err, bail};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "     stats";

pub const DEFAULT_STATS_BASE_URL: &str = "https://pypistats.org";

/// Body of `GET /api/packages/{name}/recent`.
#[derive(Debug, Deserialize)]
struct RecentResponse {
    #[serde(default)]
    data: Option<RecentData>,
}

#[derive(Debug, Deserialize)]
#[expect(clippy::struct_field_names, reason = "field names match the pypistats API exactly")]
struct RecentData {
    last_day: i64,
    last_week: i64,
    last_month: i64,
}

/// Client for the pypistats `recent` endpoint.
#[derive(Debug, Clone)]
pub struct Provider {
    client: reqwest::Client,
    base_url: String,
    throttler: Arc<Throttler>,
}

impl Provider {
    /// Create a new provider.
    ///
    /// `throttler` is the one bounding the whole refresh; a request that is still
    /// rate-limited after all retries pauses it.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: Option<&str>, throttler: Arc<Throttler>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_STATS_BASE_URL).to_string(),
            throttler,
        }
    }

    fn recent_url(&self, name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).into_app_err_with(|| format!("invalid stats base URL '{}'", self.base_url))?;
        let _ = url
            .path_segments_mut()
            .map_err(|()| app_err!("stats base URL '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(["api", "packages", name, "recent"]);
        Ok(url)
    }

    async fn fetch_stats_core(&self, name: &str) -> Result<StatsOutcome> {
        let url = self.recent_url(name)?;
        let resp = resilient_get(&self.client, url.as_str()).await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(StatsOutcome::NotFound);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let delay = parse_retry_after(resp.headers()).map_or(DEFAULT_RATE_LIMIT_DELAY, Duration::from_secs);
            if self.throttler.pause_for(delay) {
                log::info!(target: LOG_TARGET, "Rate limited by stats service, pausing requests for {}s", delay.as_secs());
            }
            bail!("rate limited by stats service");
        }

        if !status.is_success() {
            bail!("stats service answered with HTTP {status}");
        }

        let body = resp.bytes().await.into_app_err("unable to read stats response body")?;
        parse_recent(&body)
    }
}

impl StatsSource for Provider {
    async fn fetch_stats(&self, name: &str) -> Result<StatsOutcome> {
        let outcome = self.fetch_stats_core(name).await;
        if let Ok(outcome) = &outcome {
            log::debug!(target: LOG_TARGET, "Stats for '{name}': {outcome:?}");
        }
        outcome
    }
}

/// Interpret the body of a `recent` response.
///
/// An empty body, a JSON `null`, and a body without `data` all mean the service
/// has nothing for the package.
fn parse_recent(body: &[u8]) -> Result<StatsOutcome> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StatsOutcome::NotFound);
    }

    let parsed: Option<RecentResponse> = serde_json::from_slice(body).into_app_err("malformed stats response")?;
    let Some(data) = parsed.and_then(|r| r.data) else {
        return Ok(StatsOutcome::NotFound);
    };

    let counts = DownloadCounts::from_signed(data.last_day, data.last_week, data.last_month).ok_or_else(|| {
        app_err!(
            "stats response carries negative counts ({}, {}, {})",
            data.last_day,
            data.last_week,
            data.last_month
        )
    })?;

    Ok(StatsOutcome::Valid(counts))
}
