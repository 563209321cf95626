use super::{IndexEntry, IndexSource};
use crate::Result;
use crate::http::resilient_get;
use ohno::{IntoAppError, bail};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Instant;
use url::Url;

const LOG_TARGET: &str = "     index";

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple/";

static ANCHOR_OPEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>"#).expect("invalid regex")
});

/// An anchor's text ends at its closing tag, or at the next anchor when it is never closed.
static ANCHOR_END_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</a\s*>|<a[\s>]").expect("invalid regex"));

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("invalid regex"));

/// Reads the PyPI simple index.
#[derive(Debug, Clone)]
pub struct Provider {
    client: reqwest::Client,
    index_url: String,
}

impl Provider {
    #[must_use]
    pub fn new(client: reqwest::Client, index_url: Option<&str>) -> Self {
        Self {
            client,
            index_url: index_url.unwrap_or(DEFAULT_INDEX_URL).to_string(),
        }
    }

    async fn fetch_index_core(&self) -> Result<Vec<IndexEntry>> {
        log::info!(target: LOG_TARGET, "Fetching package index from '{}'", self.index_url);
        let start = Instant::now();

        let resp = resilient_get(&self.client, &self.index_url)
            .await
            .into_app_err_with(|| format!("unable to reach package index '{}'", self.index_url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("package index '{}' answered with HTTP {status}", self.index_url);
        }

        let base = resp.url().clone();
        let html = resp.text().await.into_app_err("unable to read package index body")?;
        let entries = parse_index(&html, &base);

        if entries.is_empty() {
            bail!("package index '{}' lists no packages", self.index_url);
        }

        log::info!(
            target: LOG_TARGET,
            "Indexed {} packages in {:.3}s",
            entries.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(entries)
    }
}

impl IndexSource for Provider {
    async fn fetch_index(&self) -> Result<Vec<IndexEntry>> {
        self.fetch_index_core().await
    }
}

/// Extract package entries from a simple-index HTML page.
///
/// An unclosed anchor's text runs up to the next anchor. Anchors whose text is
/// blank are skipped. When a name appears more than once,
/// the first anchor wins. The result is sorted by name.
#[must_use]
pub fn parse_index(html: &str, base: &Url) -> Vec<IndexEntry> {
    let mut entries: BTreeMap<String, String> = BTreeMap::new();

    for caps in ANCHOR_OPEN_REGEX.captures_iter(html) {
        let (Some(open), Some(href)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))) else {
            continue;
        };

        let rest = html.get(open.end()..).unwrap_or_default();
        let text = ANCHOR_END_REGEX
            .find(rest)
            .map_or(rest, |end| rest.get(..end.start()).unwrap_or_default());
        let name = decode_entities(TAG_REGEX.replace_all(text, "").trim());
        if name.is_empty() {
            continue;
        }

        let href = decode_entities(href.as_str().trim());
        let url = match base.join(&href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Keeping unresolvable link '{href}' for '{name}': {e}");
                href
            }
        };

        let _ = entries.entry(name).or_insert(url);
    }

    entries.into_iter().map(|(name, url)| IndexEntry { name, url }).collect()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
