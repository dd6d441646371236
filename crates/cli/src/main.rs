mod cli;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytgrab_core::{
    load_config_or_default, parse_cookie_source, validate_config, Browser, Config,
    DownloadOrchestrator, DownloadRequest, FetchProfile, MetadataProbe, RunOutcome, ToolPaths,
};

use cli::{Cli, Command, DownloadArgs, ProbeArgs};
use progress::ProgressRenderer;

/// Exit status for a run stopped by Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.default_filter().into());

    let json = cli.log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let plain = (!cli.log_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config_path();
    info!("Loading configuration from {:?}", config_path);
    let config = load_config_or_default(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    match cli.command {
        Command::Download(args) => download(&config, args).await,
        Command::Probe(args) => probe(&config, args).await,
    }
}

/// Explicit `--cookies`, else the configured default.
fn cookie_source(config: &Config, flag: Option<&str>) -> Result<Option<Browser>> {
    let source = match flag {
        Some(name) => parse_cookie_source(name)?,
        None => config.download.cookie_source()?,
    };
    Ok(source)
}

async fn download(config: &Config, args: DownloadArgs) -> Result<i32> {
    let tools = ToolPaths::resolve(&config.tools).context("Fetch tool is not installed")?;
    let profile = FetchProfile::from_config(config);

    let output_dir: PathBuf = args
        .output_dir
        .unwrap_or_else(|| config.download.output_dir.clone());
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let cookies = cookie_source(config, args.cookies.as_deref())?;
    let format = args
        .format
        .unwrap_or_else(|| config.download.format.clone());
    let request = DownloadRequest::new(args.url, &output_dir)
        .with_format(format)
        .with_cookies(cookies);

    info!(
        url = %request.url,
        output_dir = %output_dir.display(),
        cookies = ?cookies,
        "Starting download"
    );

    let orchestrator = DownloadOrchestrator::with_system_launcher(profile, tools);
    let renderer = ProgressRenderer::new();
    let sink = renderer.clone();
    let handle = orchestrator.begin(request, move |line: &str| sink.render(line))?;

    let cancel = handle.cancel_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling download");
            cancel.cancel();
        }
    });

    let report = handle.wait().await;
    renderer.finish();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let code = match &report.outcome {
        RunOutcome::Succeeded => {
            eprintln!(
                "Downloaded to {} after {} attempt(s)",
                output_dir.display(),
                report.attempts.len()
            );
            0
        }
        RunOutcome::Failed(reason) => {
            eprintln!("Download failed: {reason}");
            1
        }
        RunOutcome::Cancelled => {
            eprintln!("Download cancelled");
            EXIT_CANCELLED
        }
    };

    Ok(code)
}

async fn probe(config: &Config, args: ProbeArgs) -> Result<i32> {
    let tools = ToolPaths::resolve(&config.tools).context("Fetch tool is not installed")?;
    let cookies = cookie_source(config, args.cookies.as_deref())?;
    let probe = MetadataProbe::new(
        tools.fetcher,
        Arc::new(FetchProfile::from_config(config)),
        config.probe.timeout_secs,
    );

    let Some(metadata) = probe.probe(&args.url, cookies).await else {
        eprintln!("Metadata unavailable for {}", args.url);
        return Ok(1);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(0);
    }

    println!("Title:     {}", metadata.title);
    println!("ID:        {}", metadata.id);
    if let Some(uploader) = &metadata.uploader {
        println!("Uploader:  {uploader}");
    }
    if let Some(duration) = metadata.duration {
        println!("Duration:  {}", format_duration(duration));
    }
    if let Some(extractor) = &metadata.extractor_key {
        println!("Extractor: {extractor}");
    }
    println!("Formats:   {}", metadata.format_count());

    Ok(0)
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
