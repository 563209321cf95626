use super::Client;
use crate::Result;
use crate::dataset::csv_table::{CSV_FILE_NAME, read_snapshot_csv};
use crate::dataset::table::{PARQUET_FILE_NAME, read_snapshot_parquet, write_snapshot_parquet};
use crate::dataset::{DatasetStore, Snapshot};
use bytes::Bytes;
use ohno::EnrichableExt;

const LOG_TARGET: &str = "       hub";

/// A dataset published to a Hub dataset repository.
#[derive(Debug, Clone)]
pub struct HubStore {
    client: Client,
}

impl HubStore {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Make sure the repository exists, creating it as a private dataset if needed.
    pub async fn prepare(&self) -> Result<()> {
        if self.client.dataset_exists().await? {
            log::debug!(target: LOG_TARGET, "Dataset repository '{}' exists", self.client.repo());
            return Ok(());
        }

        log::info!(target: LOG_TARGET, "Creating private dataset repository '{}'", self.client.repo());
        self.client.create_dataset(true).await
    }
}

impl DatasetStore for HubStore {
    async fn load(&self) -> Result<Snapshot> {
        let repo = self.client.repo();

        if let Some(data) = self.client.download_file(PARQUET_FILE_NAME).await? {
            log::info!(target: LOG_TARGET, "Loaded '{PARQUET_FILE_NAME}' from '{repo}' ({} bytes)", data.len());
            return read_snapshot_parquet(data).map_err(|e| e.enrich_with(|| format!("decoding '{PARQUET_FILE_NAME}' from '{repo}'")));
        }

        if let Some(data) = self.client.download_file(CSV_FILE_NAME).await? {
            log::info!(target: LOG_TARGET, "Loaded '{CSV_FILE_NAME}' from '{repo}' ({} bytes)", data.len());
            return read_snapshot_csv(&data).map_err(|e| e.enrich_with(|| format!("decoding '{CSV_FILE_NAME}' from '{repo}'")));
        }

        log::info!(target: LOG_TARGET, "No dataset in '{repo}' yet, starting empty");
        Ok(Snapshot::new())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let data = Bytes::from(write_snapshot_parquet(snapshot)?);
        let message = snapshot.summary().commit_message();

        let pointer = self.client.upload_lfs(data).await?;
        self.client
            .commit(&message, &[(PARQUET_FILE_NAME, &pointer)])
            .await
            .map_err(|e| e.enrich_with(|| format!("publishing to '{}'", self.client.repo())))
    }

    fn location(&self) -> String {
        format!("hub:{}", self.client.repo())
    }
}
