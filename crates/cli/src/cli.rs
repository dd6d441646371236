//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ytgrab")]
#[command(author, version, about)]
pub struct Cli {
    /// Configuration file (defaults to $YTGRAB_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a URL, escalating through fallback strategies on failure
    Download(DownloadArgs),
    /// Print metadata for a URL without downloading
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    pub url: String,

    /// Format selector passed to the fetch tool
    #[arg(short, long)]
    pub format: Option<String>,

    /// Browser to read cookies from, or "none"
    #[arg(long)]
    pub cookies: Option<String>,

    /// Directory the file is written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Print the final run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    pub url: String,

    /// Browser to read cookies from, or "none"
    #[arg(long)]
    pub cookies: Option<String>,

    /// Print the raw metadata as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Log filter implied by `-v` flags, used when `RUST_LOG` is unset.
    pub fn default_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Explicit `--config`, else the `YTGRAB_CONFIG` environment variable.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os("YTGRAB_CONFIG").map(PathBuf::from))
    }
}
