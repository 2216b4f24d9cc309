//! State of one crawl run
//!
//! # Components
//!
//! - `CrawlPhase`: the controller's `{Discovering, Extracting, Done, Aborted}` state machine
//! - `CrawlState`: target, seen-set, pending frontier, completed records and pagination cursor

mod crawl_phase;
mod crawl_state;

pub use crawl_phase::CrawlPhase;
pub use crawl_state::{Candidate, CrawlState};
