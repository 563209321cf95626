use super::{DownloadRow, DownloadsTable, download_data};
use crate::Result;
use crate::dataset::decode_parquet;
use crate::dataset::hub::{Client, RepoId};
use crate::http::{ClientOptions, build_client};
use bytes::Bytes;
use directories::BaseDirs;
use ohno::{EnrichableExt, IntoAppError, app_err};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

const LOG_TARGET: &str = "    reader";

/// Repository the published dataset lives in unless overridden.
pub const DEFAULT_REPO: &str = "HansBug/pypi_downloads";

pub const DATA_FILE_ENV: &str = "PYPI_DOWNLOADS_DATA_FILE";
pub const REPO_ENV: &str = "PYPI_DOWNLOADS_REPO";
pub const HUB_ENDPOINT_ENV: &str = "HF_ENDPOINT";
pub const HUB_TOKEN_ENV: &str = "HF_TOKEN";

const DATA_FILE_NAME: &str = "downloads.parquet";

/// Where the reader finds its artifact, and where it fetches it from when missing.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub data_file: PathBuf,
    pub repo: RepoId,
    pub hub_endpoint: Option<String>,
    pub hub_token: Option<String>,
}

impl ReaderConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let data_file = match non_empty_env(DATA_FILE_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_data_file()?,
        };

        let repo = non_empty_env(REPO_ENV).unwrap_or_else(|| DEFAULT_REPO.to_string());

        Ok(Self {
            data_file,
            repo: RepoId::parse(&repo)?,
            hub_endpoint: non_empty_env(HUB_ENDPOINT_ENV),
            hub_token: non_empty_env(HUB_TOKEN_ENV),
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// The artifact location under the platform data directory.
pub fn default_data_file() -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or_else(|| app_err!("could not determine the data directory, set {DATA_FILE_ENV} instead"))?;
    Ok(dirs.data_dir().join("pypi-downloads").join(DATA_FILE_NAME))
}

/// Loads the downloads table once and hands out shared references to it.
///
/// A failed load leaves the loader empty, so a later call tries again.
#[derive(Debug)]
pub struct DataLoader {
    config: ReaderConfig,
    table: OnceCell<Arc<DownloadsTable>>,
}

impl DataLoader {
    #[must_use]
    pub const fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            table: OnceCell::const_new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The shared table. Every successful call returns the same `Arc`.
    pub async fn load(&self) -> Result<Arc<DownloadsTable>> {
        self.table
            .get_or_try_init(|| async { load_table(&self.config).await.map(Arc::new) })
            .await
            .cloned()
    }

    /// A private copy of every row.
    pub async fn load_owned(&self) -> Result<Vec<DownloadRow>> {
        Ok(self.load().await?.to_rows())
    }
}

static TABLE: OnceCell<Arc<DownloadsTable>> = OnceCell::const_new();

/// The process-wide downloads table, configured from the environment.
///
/// The first successful call reads the local artifact, fetching it from the Hub
/// if it is missing. Later calls return the same `Arc` without touching the disk.
pub async fn load_data() -> Result<Arc<DownloadsTable>> {
    TABLE
        .get_or_try_init(|| async {
            let config = ReaderConfig::from_env()?;
            load_table(&config).await.map(Arc::new)
        })
        .await
        .cloned()
}

/// A private, mutable copy of the process-wide downloads table.
pub async fn load_data_owned() -> Result<Vec<DownloadRow>> {
    Ok(load_data().await?.to_rows())
}

async fn load_table(config: &ReaderConfig) -> Result<DownloadsTable> {
    let path = &config.data_file;

    let exists = tokio::fs::try_exists(path)
        .await
        .into_app_err_with(|| format!("unable to access '{}'", path.display()))?;

    if !exists {
        log::info!(
            target: LOG_TARGET,
            "'{}' not found, fetching it from '{}'",
            path.display(),
            config.repo
        );
        fetch_artifact(config).await.map_err(|e| e.enrich_with(|| unavailable_message(path)))?;
    }

    read_downloads_file(path).await.map_err(|e| e.enrich_with(|| unavailable_message(path)))
}

async fn fetch_artifact(config: &ReaderConfig) -> Result<usize> {
    let http = build_client(&ClientOptions {
        proxy_pool: None,
        bearer_token: config.hub_token.clone(),
    })?;

    let client = Client::new(http, config.hub_endpoint.as_deref(), config.repo.clone());
    download_data(&client, &config.data_file).await
}

fn unavailable_message(path: &Path) -> String {
    format!(
        "download data is not available at '{}'; run `pypi-downloads download-data --output {}` or set {DATA_FILE_ENV} to an existing file",
        path.display(),
        path.display()
    )
}

/// Read a downloads artifact from disk.
pub async fn read_downloads_file(path: &Path) -> Result<DownloadsTable> {
    let data = tokio::fs::read(path)
        .await
        .into_app_err_with(|| format!("unable to read '{}'", path.display()))?;

    let (_, batches) = decode_parquet(Bytes::from(data))?;
    let table = DownloadsTable::from_batches(&batches)?;

    log::debug!(target: LOG_TARGET, "Loaded {} packages from '{}'", table.len(), path.display());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Snapshot, encode_parquet};
    use crate::reader::valid_downloads_batch;

    fn config(data_file: PathBuf, hub_endpoint: &str) -> ReaderConfig {
        ReaderConfig {
            data_file,
            repo: RepoId::parse("owner/data").unwrap(),
            hub_endpoint: Some(hub_endpoint.to_string()),
            hub_token: None,
        }
    }

    #[test]
    fn test_unavailable_message_names_remedies() {
        let message = unavailable_message(Path::new("/tmp/downloads.parquet"));
        assert!(message.contains("/tmp/downloads.parquet"));
        assert!(message.contains("pypi-downloads download-data"));
        assert!(message.contains(DATA_FILE_ENV));
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_loader_reads_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(DATA_FILE_NAME);
        let batch = valid_downloads_batch(&Snapshot::new()).unwrap();
        std::fs::write(&path, encode_parquet(&batch).unwrap()).unwrap();

        let loader = DataLoader::new(config(path, "http://127.0.0.1:9"));
        let first = loader.load().await.unwrap();
        let second = loader.load().await.unwrap();
        assert!(first.is_empty());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri does not support sockets")]
    async fn test_failed_load_is_retried() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(DATA_FILE_NAME);
        // An empty mock server answers 404 for every file.
        let server = wiremock::MockServer::start().await;
        let loader = DataLoader::new(config(path.clone(), &server.uri()));

        let _ = loader.load().await.unwrap_err();
        assert!(!path.exists());

        let batch = valid_downloads_batch(&Snapshot::new()).unwrap();
        std::fs::write(&path, encode_parquet(&batch).unwrap()).unwrap();
        assert!(loader.load().await.unwrap().is_empty());
    }
}
