//! Thread-Sift main entry point
//!
//! This is the command-line interface for the Thread-Sift forum extractor.

use clap::Parser;
use std::path::{Path, PathBuf};
use thread_sift::config::{load_config_with_hash, Config, Pagination};
use thread_sift::crawler::run_crawl;
use thread_sift::fetch::FetchSession;
use thread_sift::ocr::{Enricher, TesseractEngine};
use thread_sift::output::{load_records, print_statistics, write_json_new};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Thread-Sift: resilient forum thread extraction
///
/// Thread-Sift discovers threads on paginated forum listings, extracts posts,
/// replies, media and interaction counts through ordered fallback lookups, and
/// saves every completed record, even when the run is interrupted.
#[derive(Parser, Debug)]
#[command(name = "thread-sift")]
#[command(version)]
#[command(about = "Resilient forum thread extraction", long_about = None)]
struct Cli {
    /// Path to TOML site configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "enrich")]
    dry_run: bool,

    /// Run OCR over the media of an existing dump instead of crawling
    #[arg(long, value_name = "DUMP")]
    enrich: Option<PathBuf>,

    /// Where to write the enriched dump (default: `<dump stem>_ocr.json`)
    #[arg(long, value_name = "PATH", requires = "enrich")]
    enrich_output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if let Some(dump) = &cli.enrich {
        handle_enrich(&config, dump, cli.enrich_output.as_deref()).await?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("thread_sift=info,warn"),
            1 => EnvFilter::new("thread_sift=debug,info"),
            2 => EnvFilter::new("thread_sift=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Thread-Sift Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Target count: {}", config.crawler.target_count);
    println!("  Workers: {}", config.crawler.workers);
    println!("  Backend: {:?}", config.crawler.backend);
    println!("  Root wait: {}ms", config.crawler.root_wait_ms);
    println!("  Field wait: {}ms", config.crawler.field_wait_ms);
    println!("  Listing wait: {}ms", config.crawler.listing_wait_ms);

    println!("\nListing:");
    if let Some(base) = &config.listing.base_url {
        println!("  Base URL: {}", base);
        println!("  Pagination: {}", describe_pagination(&config.listing.pagination));
        println!("  Item locators: {}", config.listing.item_locators.len());
    }
    if !config.listing.urls.is_empty() {
        println!("  Explicit URLs: {}", config.listing.urls.len());
    }
    if let Some(file) = &config.listing.urls_file {
        println!("  URL file: {}", file.display());
    }
    if !config.listing.allowed_domains.is_empty() {
        println!("  Allowed domains: {}", config.listing.allowed_domains.join(", "));
    }

    println!("\nFields:");
    println!("  Root strategies: {}", config.fields.root.len());
    println!("  Author strategies: {}", config.fields.author.len());
    println!("  Body strategies: {}", config.fields.body.len());
    println!("  Timestamp strategies: {}", config.fields.timestamp.len());
    println!("  Reply containers: {}", config.replies.containers.len());

    println!("\nFilters:");
    match config.filters.min_age_days {
        Some(days) => println!("  Minimum age: {} days", days),
        None => println!("  Minimum age: disabled"),
    }
    println!("  Minimum replies: {}", config.filters.min_replies);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory.display());
    println!("  Prefix: {}", config.output.prefix);

    println!("\n✓ Configuration is valid");
}

fn describe_pagination(pagination: &Pagination) -> String {
    match pagination {
        Pagination::PathSegment => "path segment (/2/, /3/, ...)".to_string(),
        Pagination::QueryParam { name } => format!("query parameter '{}'", name),
        Pagination::Scroll { max_scrolls } => format!("infinite scroll (max {} scrolls)", max_scrolls),
        Pagination::Single => "single page".to_string(),
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    tracing::info!(
        "Collecting {} records into {}",
        config.crawler.target_count,
        config.output.directory.display()
    );

    match run_crawl(config, cancel).await {
        Ok(report) => {
            let termination = report.termination.to_string();
            print_statistics(&report.stats, &termination, Some(&report.output_path));
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Fires the token on Ctrl+C
async fn shutdown_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("Interrupt received, saving collected records...");
            cancel.cancel();
        }
        Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
    }
}

/// Handles the --enrich mode: OCR over an existing dump
async fn handle_enrich(
    config: &Config,
    dump: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut records = load_records(dump)?;
    tracing::info!("Loaded {} records from {}", records.len(), dump.display());

    let fetch = FetchSession::from_config(&config.fetch)?;
    let engine = TesseractEngine::from_config(&config.ocr);
    let enricher = Enricher::new(fetch, engine, config.ocr.concurrency);

    let summary = enricher.enrich_all(&mut records).await;

    let target = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = dump
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "dump".to_string());
            dump.with_file_name(format!("{}_ocr.json", stem))
        }
    };
    let written = write_json_new(&target, &records)?;

    println!("=== OCR Enrichment ===\n");
    println!("  Records: {}", records.len());
    println!("  Images recognized: {}", summary.recognized);
    println!("  Images failed: {}", summary.failed);
    println!("  Output: {}", written.display());

    Ok(())
}
