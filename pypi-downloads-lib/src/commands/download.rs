use super::Host;
use super::common::{LogLevel, init_logging};
use crate::Result;
use crate::dataset::hub::{Client, RepoId};
use crate::http::{ClientOptions, build_client};
use crate::reader::{DEFAULT_REPO, default_data_file, download_data};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Hub dataset repository to download from
    #[arg(long, value_name = "REPO", env = "PYPI_DOWNLOADS_REPO", default_value = DEFAULT_REPO)]
    pub repo: String,

    /// Where to write the downloads table (default is the platform data directory)
    #[arg(long, short = 'o', value_name = "PATH", env = "PYPI_DOWNLOADS_DATA_FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Hub base URL
    #[arg(long, value_name = "URL", env = "HF_ENDPOINT")]
    pub hub_endpoint: Option<String>,

    /// Hub access token, needed for private repositories
    #[arg(long, value_name = "TOKEN", env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: LogLevel,
}

/// Fetch the published dataset and write the readable downloads table.
pub async fn download_command<H: Host>(host: &mut H, args: &DownloadArgs) -> Result<()> {
    init_logging(args.log_level);

    let output = match &args.output {
        Some(path) => PathBuf::from(path.as_std_path()),
        None => default_data_file()?,
    };

    let http = build_client(&ClientOptions {
        proxy_pool: None,
        bearer_token: args.hf_token.clone(),
    })?;
    let client = Client::new(http, args.hub_endpoint.as_deref(), RepoId::parse(&args.repo)?);

    let rows = download_data(&client, &output).await?;
    let _ = writeln!(host.output(), "Wrote {rows} packages to {}", output.display());
    Ok(())
}
