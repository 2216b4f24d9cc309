//! Crawler module: the crawl frontier controller
//!
//! This module contains the core crawling logic, including:
//! - Candidate discovery over listing pages or URL lists
//! - The sequential coordinator and the worker pool
//! - Session lifetime and the one mandatory checkpoint per run

mod coordinator;
mod discovery;
mod pool;

pub use coordinator::{Coordinator, Termination};
pub use discovery::Discoverer;

use crate::config::{Backend, Config};
use crate::extract::Extractor;
use crate::fetch::FetchSession;
use crate::output::{Checkpoint, CrawlStatistics};
use crate::render::{RenderSession, SessionFactory, StaticSessionFactory};
use crate::state::CrawlState;
use crate::SiftError;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub termination: Termination,
    /// The dump holding every completed record
    pub output_path: PathBuf,
    pub stats: CrawlStatistics,
}

/// Runs a complete crawl with the configured rendering backend
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Compile the extraction rules
/// 2. Open the rendering sessions
/// 3. Discover and extract until a terminal transition
/// 4. Persist the completed records exactly once
/// 5. Close every session
///
/// # Arguments
///
/// * `config` - The validated run configuration
/// * `cancel` - Token fired on external interruption
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The run ended (in any way) and its records were persisted
/// * `Err(SiftError)` - Setup or the final persist failed
///
/// # Example
///
/// ```no_run
/// use thread_sift::config::load_config;
/// use thread_sift::crawler::run_crawl;
/// use tokio_util::sync::CancellationToken;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("configs/4plebs.toml"))?;
/// let report = run_crawl(config, CancellationToken::new()).await?;
/// println!("{}", report.output_path.display());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, cancel: CancellationToken) -> Result<CrawlReport, SiftError> {
    let poll_interval = Duration::from_millis(config.crawler.poll_interval_ms);

    match config.crawler.backend {
        Backend::Static => {
            let fetch = FetchSession::from_config(&config.fetch)?;
            let factory = StaticSessionFactory::new(fetch, poll_interval);
            run_crawl_with(&config, &factory, cancel).await
        }
        #[cfg(feature = "browser")]
        Backend::Browser => {
            let factory =
                crate::render::BrowserSessionFactory::launch(&config.browser, poll_interval)
                    .await?;
            let report = run_crawl_with(&config, &factory, cancel).await;
            factory.shutdown().await;
            report
        }
        #[cfg(not(feature = "browser"))]
        Backend::Browser => Err(crate::ConfigError::Validation(
            "backend \"browser\" requires building with the `browser` feature".to_string(),
        )
        .into()),
    }
}

/// Runs a complete crawl over sessions opened by `factory`
///
/// Whatever ends the run (target, exhaustion, interrupt, fatal fault or a
/// session that cannot even be opened), the records collected so far are
/// persisted before this returns.
pub async fn run_crawl_with<F: SessionFactory>(
    config: &Config,
    factory: &F,
    cancel: CancellationToken,
) -> Result<CrawlReport, SiftError> {
    let extractor = Extractor::from_config(config)?;
    let discoverer = Discoverer::from_config(config, extractor.identity().clone())?;
    let checkpoint = Checkpoint::from_config(&config.output);
    let mut state = CrawlState::new(config.crawler.target_count);

    let termination = match factory.open().await {
        Ok(session) => {
            let mut coordinator = Coordinator::new(
                session,
                discoverer,
                extractor,
                cancel,
                config.crawler.max_consecutive_failures,
            );

            let termination = if config.crawler.workers > 1 {
                coordinator
                    .run_pool(
                        factory,
                        config.crawler.workers,
                        &mut state,
                        config.crawler.sort_by_discovery,
                    )
                    .await
            } else {
                coordinator.run(&mut state).await
            };

            if let Err(e) = coordinator.session_mut().close().await {
                tracing::warn!("Failed to close listing session: {}", e);
            }
            termination
        }
        Err(e) => {
            tracing::error!("Failed to open rendering session: {}", e);
            let termination = Termination::Fatal(e.to_string());
            state.stats_mut().fatal = Some(e.to_string());
            state.transition(termination.phase());
            termination
        }
    };

    let output_path = checkpoint.persist(state.records(), termination.persist_reason())?;

    Ok(CrawlReport {
        termination,
        output_path,
        stats: state.stats().clone(),
    })
}
