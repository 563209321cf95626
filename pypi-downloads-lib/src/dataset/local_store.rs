use super::csv_table::{CSV_FILE_NAME, read_snapshot_csv};
use super::table::{PARQUET_FILE_NAME, read_snapshot_parquet, write_snapshot_parquet};
use super::{DatasetStore, Snapshot};
use crate::Result;
use bytes::Bytes;
use fs4::fs_std::FileExt;
use ohno::{EnrichableExt, IntoAppError};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "   dataset";

/// Sits next to the artifact it guards.
const LOCK_FILE_NAME: &str = "dataset.parquet.lock";

/// Exclusive claim on the dataset artifact in one directory.
///
/// The lock file holds the process id of the current holder, so a waiting run
/// can say who it is waiting for. A leftover file from a dead process is harmless.
#[derive(Debug)]
struct DatasetLock(File);

impl DatasetLock {
    async fn acquire(dir: &Path) -> Result<Self> {
        let lock_path = dir.join(LOCK_FILE_NAME);
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&lock_path))
            .await
            .into_app_err("dataset lock task panicked")?
    }

    fn acquire_blocking(lock_path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .into_app_err_with(|| format!("unable to open dataset lock '{}'", lock_path.display()))?;

        let acquired = file
            .try_lock_exclusive()
            .into_app_err_with(|| format!("unable to lock dataset '{}'", lock_path.display()))?;

        if !acquired {
            let holder = std::fs::read_to_string(lock_path)
                .ok()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| "unknown".to_string());

            log::info!(
                target: LOG_TARGET,
                "Dataset in '{}' is in use by process {holder}, waiting for it to finish",
                lock_path.parent().unwrap_or(lock_path).display()
            );

            file.lock_exclusive()
                .into_app_err_with(|| format!("unable to lock dataset '{}'", lock_path.display()))?;
        }

        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .into_app_err_with(|| format!("unable to record dataset lock holder in '{}'", lock_path.display()))?;

        log::debug!(target: LOG_TARGET, "Locked dataset '{}'", lock_path.display());
        Ok(Self(file))
    }
}

impl Drop for DatasetLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            log::warn!(target: LOG_TARGET, "Could not release dataset lock: {e:#}");
        }
    }
}

/// A dataset kept in a local directory.
///
/// The dataset stays locked for as long as the store exists. A second store
/// opened on the same directory waits until the first one is dropped.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    _lock: DatasetLock,
}

impl LocalStore {
    /// Open (creating if needed) the directory and lock its dataset.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .into_app_err_with(|| format!("unable to create dataset directory '{}'", dir.display()))?;

        let lock = DatasetLock::acquire(&dir).await?;
        Ok(Self { dir, _lock: lock })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn parquet_path(&self) -> PathBuf {
        self.dir.join(PARQUET_FILE_NAME)
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).into_app_err_with(|| format!("unable to read '{}'", path.display())),
        }
    }
}

impl DatasetStore for LocalStore {
    async fn load(&self) -> Result<Snapshot> {
        let parquet_path = self.parquet_path();
        if let Some(data) = Self::read_optional(&parquet_path).await? {
            log::info!(target: LOG_TARGET, "Loading dataset from '{}'", parquet_path.display());
            return read_snapshot_parquet(Bytes::from(data)).map_err(|e| e.enrich_with(|| format!("decoding '{}'", parquet_path.display())));
        }

        let csv_path = self.dir.join(CSV_FILE_NAME);
        if let Some(data) = Self::read_optional(&csv_path).await? {
            log::info!(target: LOG_TARGET, "Loading dataset from '{}'", csv_path.display());
            return read_snapshot_csv(&data).map_err(|e| e.enrich_with(|| format!("decoding '{}'", csv_path.display())));
        }

        log::info!(target: LOG_TARGET, "No dataset in '{}' yet, starting empty", self.dir.display());
        Ok(Snapshot::new())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let data = write_snapshot_parquet(snapshot)?;

        let final_path = self.parquet_path();
        let temp_path = self.dir.join(format!("{PARQUET_FILE_NAME}.tmp"));

        tokio::fs::write(&temp_path, &data)
            .await
            .into_app_err_with(|| format!("unable to write '{}'", temp_path.display()))?;

        tokio::fs::rename(&temp_path, &final_path)
            .await
            .into_app_err_with(|| format!("unable to move dataset into place at '{}'", final_path.display()))?;

        log::info!(
            target: LOG_TARGET,
            "Saved {} records ({} bytes) to '{}'",
            snapshot.len(),
            data.len(),
            final_path.display()
        );

        Ok(())
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}
