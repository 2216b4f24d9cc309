//! Run statistics
//!
//! Counters accumulated by the crawl controller and printed at the end of a run.

use crate::extract::SkipReason;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlStatistics {
    /// Listing pages (or scroll rounds) visited
    pub listing_rounds: u64,

    /// Unique candidate URLs discovered
    pub discovered: u64,

    /// Extraction attempts
    pub attempted: u64,

    /// Records appended
    pub completed: u64,

    /// Skipped URLs by reason (disqualifications excluded)
    pub skipped: BTreeMap<String, u64>,

    /// Disqualified records by filter
    pub disqualified: BTreeMap<String, u64>,

    /// Message of the fault that aborted the run, if any
    pub fatal: Option<String>,
}

impl CrawlStatistics {
    /// Counts a skipped URL under its reason
    pub fn record_skip(&mut self, reason: &SkipReason) {
        let bucket = match reason {
            SkipReason::Disqualified(_) => &mut self.disqualified,
            _ => &mut self.skipped,
        };
        *bucket.entry(reason.label().to_string()).or_default() += 1;
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }

    pub fn disqualified_total(&self) -> u64 {
        self.disqualified.values().sum()
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `termination` - How the run ended
/// * `output` - The persisted dump, if one was written
pub fn print_statistics(stats: &CrawlStatistics, termination: &str, output: Option<&Path>) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Termination: {}", termination);
    println!("  Listing rounds: {}", stats.listing_rounds);
    println!("  URLs discovered: {}", stats.discovered);
    println!("  Extraction attempts: {}", stats.attempted);
    println!("  Records saved: {}", stats.completed);
    println!();

    if !stats.skipped.is_empty() {
        println!("Skipped ({}):", stats.skipped_total());
        for (reason, count) in &stats.skipped {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if !stats.disqualified.is_empty() {
        println!("Disqualified ({}):", stats.disqualified_total());
        for (reason, count) in &stats.disqualified {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if let Some(fatal) = &stats.fatal {
        println!("Fatal: {}", fatal);
        println!();
    }

    let success_rate = if stats.attempted > 0 {
        (stats.completed as f64 / stats.attempted as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} URLs yielded a record)",
        success_rate, stats.completed, stats.attempted
    );

    if let Some(path) = output {
        println!("Output: {}", path.display());
    }
}
