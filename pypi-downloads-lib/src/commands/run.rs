//! Command dispatch logic for pypi-downloads

use super::{DownloadArgs, InitArgs, SyncArgs, download_command, init_config, sync_command};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use std::io::Write;

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "pypi-downloads", author, version, long_about = None)]
#[command(about = "Keep a dataset of recent PyPI download counts up to date")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the published table of recent download counts
    DownloadData(DownloadArgs),
    /// Refresh stale records and publish the dataset
    Sync(Box<SyncArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let code = e.exit_code();
            let _ = if e.use_stderr() {
                write!(host.error(), "{}", e.render().ansi())
            } else {
                write!(host.output(), "{}", e.render().ansi())
            };
            host.exit(code);
            return Ok(());
        }
    };

    match &cli.command {
        Command::DownloadData(args) => download_command(host, args).await,
        Command::Sync(args) => sync_command(host, args).await,
        Command::Init(args) => init_config(host, args),
    }
}
