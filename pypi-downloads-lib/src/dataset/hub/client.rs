//! Hugging Face Hub API client
//!
//! Minimal client for the handful of dataset-repository calls the tool needs:
//! existence check, creation, file download, Git LFS upload, and commit.

use crate::Result;
use crate::http::{resilient_get, resilient_send};
use bytes::Bytes;
use core::time::Duration;
use ohno::{IntoAppError, app_err, bail};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const LOG_TARGET: &str = "       hub";

pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";
const NDJSON_MEDIA_TYPE: &str = "application/x-ndjson";

/// Uploads can be large; give them more room than regular API calls.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// A dataset repository id of the form `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((owner, name)) = s.split_once('/') else {
            bail!("repository id '{s}' is not of the form 'owner/name'");
        };

        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("repository id '{s}' is not of the form 'owner/name'");
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl core::fmt::Display for RepoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A file stored in LFS, ready to be referenced from a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsPointer {
    pub oid: String,
    pub size: u64,
}

impl LfsPointer {
    #[must_use]
    pub fn for_content(data: &[u8]) -> Self {
        Self {
            oid: hex::encode(Sha256::digest(data)),
            size: data.len() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    #[serde(rename = "type")]
    repo_type: &'static str,
    name: &'a str,
    organization: &'a str,
    private: bool,
}

#[derive(Debug, Serialize)]
struct LfsBatchRequest<'a> {
    operation: &'static str,
    transfers: [&'static str; 1],
    objects: [LfsObjectSpec<'a>; 1],
    hash_algo: &'static str,
}

#[derive(Debug, Serialize)]
struct LfsObjectSpec<'a> {
    oid: &'a str,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    #[serde(default)]
    objects: Vec<LfsObjectResponse>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectResponse {
    oid: String,
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    #[serde(default)]
    upload: Option<LfsAction>,
    #[serde(default)]
    verify: Option<LfsAction>,
}

#[derive(Debug, Clone, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

/// Hub API client for one dataset repository.
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    endpoint: String,
    repo: RepoId,
}

impl Client {
    /// Create a client. Authentication, if any, is carried by `client`'s default headers.
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: Option<&str>, repo: RepoId) -> Self {
        Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_HUB_ENDPOINT).trim_end_matches('/').to_string(),
            repo,
        }
    }

    #[must_use]
    pub const fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Returns whether the dataset repository exists and is visible to us.
    pub async fn dataset_exists(&self) -> Result<bool> {
        let url = format!("{}/api/datasets/{}", self.endpoint, self.repo);
        let resp = resilient_get(&self.client, &url).await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => Ok(false),
            s => bail!("checking dataset '{}' failed with HTTP {s}", self.repo),
        }
    }

    /// Create the dataset repository. An already existing repository is not an error.
    pub async fn create_dataset(&self, private: bool) -> Result<()> {
        let url = format!("{}/api/repos/create", self.endpoint);
        let body = serde_json::to_vec(&CreateRepoRequest {
            repo_type: "dataset",
            name: self.repo.name(),
            organization: self.repo.owner(),
            private,
        })
        .into_app_err("unable to encode repository creation request")?;
        let body = Bytes::from(body);

        let resp = resilient_send("hub_create_repo", &self.client, None, move |client| {
            client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
        })
        .await?;

        match resp.status() {
            s if s.is_success() => {
                log::info!(target: LOG_TARGET, "Created dataset repository '{}'", self.repo);
                Ok(())
            }
            StatusCode::CONFLICT => Ok(()),
            s => bail!("creating dataset '{}' failed with HTTP {s}", self.repo),
        }
    }

    /// Download a file from the main revision, or `None` when the file does not exist.
    pub async fn download_file(&self, path: &str) -> Result<Option<Bytes>> {
        let url = format!("{}/datasets/{}/resolve/main/{path}", self.endpoint, self.repo);
        log::debug!(target: LOG_TARGET, "Downloading '{url}'");

        let resp = resilient_get(&self.client, &url).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            bail!("downloading '{path}' from '{}' failed with HTTP {status}", self.repo);
        }

        let data = resp
            .bytes()
            .await
            .into_app_err_with(|| format!("unable to read '{path}' from '{}'", self.repo))?;

        Ok(Some(data))
    }

    /// Store `data` in the repository's LFS storage.
    pub async fn upload_lfs(&self, data: Bytes) -> Result<LfsPointer> {
        let pointer = LfsPointer::for_content(&data);

        let url = format!("{}/datasets/{}.git/info/lfs/objects/batch", self.endpoint, self.repo);
        let body = serde_json::to_vec(&LfsBatchRequest {
            operation: "upload",
            transfers: ["basic"],
            objects: [LfsObjectSpec {
                oid: &pointer.oid,
                size: pointer.size,
            }],
            hash_algo: "sha256",
        })
        .into_app_err("unable to encode LFS batch request")?;
        let body = Bytes::from(body);

        let resp = resilient_send("hub_lfs_batch", &self.client, None, move |client| {
            client
                .post(&url)
                .header(ACCEPT, LFS_MEDIA_TYPE)
                .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
                .body(body.clone())
        })
        .await?;

        let status = resp.status();
        if !status.is_success() {
            bail!("LFS batch request for '{}' failed with HTTP {status}", self.repo);
        }

        let batch: LfsBatchResponse = resp.json().await.into_app_err("malformed LFS batch response")?;
        let object = batch
            .objects
            .into_iter()
            .find(|o| o.oid == pointer.oid)
            .ok_or_else(|| app_err!("LFS batch response does not mention object {}", pointer.oid))?;

        if let Some(error) = object.error {
            bail!("LFS refused object {} ({:?}): {}", pointer.oid, error.code, error.message);
        }

        let Some(actions) = object.actions else {
            log::debug!(target: LOG_TARGET, "LFS object {} already present", pointer.oid);
            return Ok(pointer);
        };

        if let Some(upload) = actions.upload {
            self.lfs_upload(&upload, data).await?;
            log::debug!(target: LOG_TARGET, "Uploaded LFS object {} ({} bytes)", pointer.oid, pointer.size);
        }

        if let Some(verify) = actions.verify {
            self.lfs_verify(&verify, &pointer).await?;
        }

        Ok(pointer)
    }

    async fn lfs_upload(&self, action: &LfsAction, data: Bytes) -> Result<()> {
        let action = action.clone();
        let resp = resilient_send("hub_lfs_upload", &self.client, Some(UPLOAD_TIMEOUT), move |client| {
            let mut request = client.put(&action.href).body(data.clone());
            for (name, value) in &action.header {
                request = request.header(name.as_str(), value.as_str());
            }
            request
        })
        .await?;

        let status = resp.status();
        if !status.is_success() {
            bail!("LFS upload failed with HTTP {status}");
        }

        Ok(())
    }

    async fn lfs_verify(&self, action: &LfsAction, pointer: &LfsPointer) -> Result<()> {
        let action = action.clone();
        let body = serde_json::to_vec(&LfsObjectSpec {
            oid: &pointer.oid,
            size: pointer.size,
        })
        .into_app_err("unable to encode LFS verify request")?;
        let body = Bytes::from(body);

        let resp = resilient_send("hub_lfs_verify", &self.client, None, move |client| {
            let mut request = client
                .post(&action.href)
                .header(ACCEPT, LFS_MEDIA_TYPE)
                .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
                .body(body.clone());
            for (name, value) in &action.header {
                request = request.header(name.as_str(), value.as_str());
            }
            request
        })
        .await?;

        let status = resp.status();
        if !status.is_success() {
            bail!("LFS verify failed with HTTP {status}");
        }

        Ok(())
    }

    /// Commit LFS files to the main branch, replacing whatever was at their paths.
    pub async fn commit(&self, message: &str, files: &[(&str, &LfsPointer)]) -> Result<()> {
        let url = format!("{}/api/datasets/{}/commit/main", self.endpoint, self.repo);
        let body = Bytes::from(commit_payload(message, files)?);

        let resp = resilient_send("hub_commit", &self.client, None, move |client| {
            client
                .post(&url)
                .header(CONTENT_TYPE, NDJSON_MEDIA_TYPE)
                .body(body.clone())
        })
        .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            bail!("commit to '{}' failed with HTTP {status}: {detail}", self.repo);
        }

        log::info!(target: LOG_TARGET, "Committed to '{}': {message}", self.repo);
        Ok(())
    }
}

/// Build the NDJSON body of a commit request.
fn commit_payload(message: &str, files: &[(&str, &LfsPointer)]) -> Result<Vec<u8>> {
    let mut lines = Vec::with_capacity(files.len() + 1);
    lines.push(serde_json::json!({
        "key": "header",
        "value": { "summary": message, "description": "" },
    }));

    for (path, pointer) in files {
        lines.push(serde_json::json!({
            "key": "lfsFile",
            "value": { "path": path, "algo": "sha256", "oid": pointer.oid, "size": pointer.size },
        }));
    }

    let mut body = Vec::new();
    for line in lines {
        serde_json::to_writer(&mut body, &line).into_app_err("unable to encode commit request")?;
        body.push(b'\n');
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_parse() {
        let repo = RepoId::parse("HansBug/pypi_downloads").unwrap();
        assert_eq!(repo.owner(), "HansBug");
        assert_eq!(repo.name(), "pypi_downloads");
        assert_eq!(repo.to_string(), "HansBug/pypi_downloads");
    }

    #[test]
    fn test_repo_id_rejects_malformed() {
        for bad in ["", "noslash", "/name", "owner/", "a/b/c"] {
            let _ = RepoId::parse(bad).unwrap_err();
        }
    }

    #[test]
    fn test_lfs_pointer_for_content() {
        let pointer = LfsPointer::for_content(b"abc");
        assert_eq!(pointer.oid, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(pointer.size, 3);
    }

    #[test]
    fn test_commit_payload_lines() {
        let pointer = LfsPointer {
            oid: "abc".to_string(),
            size: 42,
        };
        let body = commit_payload("Update PyPI - 1 packages", &[("dataset.parquet", &pointer)]).unwrap();
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["key"], "header");
        assert_eq!(lines[0]["value"]["summary"], "Update PyPI - 1 packages");
        assert_eq!(lines[1]["key"], "lfsFile");
        assert_eq!(lines[1]["value"]["path"], "dataset.parquet");
        assert_eq!(lines[1]["value"]["oid"], "abc");
        assert_eq!(lines[1]["value"]["size"], 42);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = Client::new(reqwest::Client::new(), Some("http://localhost:1234/"), RepoId::parse("a/b").unwrap());
        assert_eq!(client.endpoint, "http://localhost:1234");
    }
}
