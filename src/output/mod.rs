//! Output module
//!
//! This module handles:
//! - Persisting completed records as reason-tagged JSON dumps
//! - Loading dumps back for post-processing
//! - Recording and printing run statistics

mod checkpoint;
pub mod stats;

pub use checkpoint::{load_records, write_json_new, Checkpoint, CheckpointError, PersistReason};
pub use stats::{print_statistics, CrawlStatistics};
