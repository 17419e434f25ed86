// Command-line product scraper
//
// Prints one JSON ExtractionResult per successful URL on stdout. Logs go to
// stderr so the output can be piped straight into jq or a file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kodegen_tools_product_scraper::{
    CONFIG_ENV, ImportIssue, IssueSink, LoaderKind, build_engine, load_yaml_config,
};

#[derive(Debug, Parser)]
#[command(name = "kodegen-product-scraper", version, about = "Extract product data from e-commerce product pages")]
struct Cli {
    /// Config file (YAML)
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Extra site profiles merged over the built-in ones
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Page loader: `browser` (Chromium) or `http` (static HTML)
    #[arg(long, value_parser = parse_loader)]
    loader: Option<LoaderKind>,

    /// URLs scraped in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    /// Append failed URLs to this JSON-lines file
    #[arg(long)]
    issues: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Product page URLs
    #[arg(required = true)]
    urls: Vec<String>,
}

fn parse_loader(value: &str) -> Result<LoaderKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "browser" => Ok(LoaderKind::Browser),
        "http" => Ok(LoaderKind::Http),
        other => Err(format!("unknown loader '{other}' (expected browser or http)")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every URL succeeded
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = load_yaml_config(cli.config.as_deref())?;
    if let Some(profiles) = cli.profiles {
        config.profiles_path = Some(profiles);
    }
    if let Some(loader) = cli.loader {
        config.loader = loader;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency.max(1);
    }

    let engine = build_engine(&config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight attempts");
            ctrl_c.cancel();
        }
    });

    info!("Scraping {} URL(s) with {:?} loader", cli.urls.len(), config.loader);
    let outcomes = engine
        .scraper()
        .scrape_many_with_cancel(&cli.urls, &cancel)
        .await;

    let mut issues = Vec::new();
    for outcome in &outcomes {
        match outcome {
            Ok(result) => {
                let json = if cli.pretty {
                    serde_json::to_string_pretty(result)?
                } else {
                    serde_json::to_string(result)?
                };
                println!("{json}");
            }
            Err(failure) => {
                warn!("{}", failure);
                issues.push(ImportIssue::from(failure));
            }
        }
    }

    engine.shutdown().await?;

    if let Some(path) = cli.issues {
        let sink = IssueSink::new(path);
        sink.record(&issues)
            .await
            .with_context(|| format!("Failed to write issues to {}", sink.path().display()))?;
    }

    info!(
        "{} succeeded, {} failed",
        outcomes.len() - issues.len(),
        issues.len()
    );
    Ok(issues.is_empty())
}
