//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the frontier controller loop that:
//! - Discovers candidate URLs on demand, one listing round at a time
//! - Extracts one record per candidate
//! - Stops at the target count, on exhaustion, on interrupt or on a fatal fault
//!
//! The controller never returns an error; every fault becomes a
//! [`Termination`] so that the caller can always persist what was collected.

use crate::crawler::Discoverer;
use crate::extract::{Extraction, Extractor};
use crate::model::Record;
use crate::output::PersistReason;
use crate::render::{RenderSession, SessionError};
use crate::state::{Candidate, CrawlPhase, CrawlState};
use std::fmt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a crawl run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The target count was reached
    Completed,
    /// The listing ran out of candidates before the target was reached
    Exhausted,
    /// The interrupt token fired
    Interrupted,
    /// The session or the source became unusable
    Fatal(String),
}

impl Termination {
    /// Phase the crawl state ends in
    pub fn phase(&self) -> CrawlPhase {
        match self {
            Termination::Completed | Termination::Exhausted => CrawlPhase::Done,
            Termination::Interrupted | Termination::Fatal(_) => CrawlPhase::Aborted,
        }
    }

    /// Tag of the dump written for this termination
    pub fn persist_reason(&self) -> PersistReason {
        match self {
            Termination::Completed | Termination::Exhausted => PersistReason::Completed,
            Termination::Interrupted => PersistReason::Interrupted,
            Termination::Fatal(_) => PersistReason::Fatal,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "target reached"),
            Termination::Exhausted => write!(f, "source exhausted"),
            Termination::Interrupted => write!(f, "interrupted"),
            Termination::Fatal(message) => write!(f, "fatal: {}", message),
        }
    }
}

/// Main crawler coordinator structure
///
/// Owns the listing session. In the sequential baseline the same session also
/// visits every detail page, so records complete in discovery order.
pub struct Coordinator<S: RenderSession> {
    pub(crate) session: S,
    pub(crate) discoverer: Discoverer,
    pub(crate) extractor: Extractor,
    pub(crate) cancel: CancellationToken,
    pub(crate) failures: FailureTracker,
}

impl<S: RenderSession> Coordinator<S> {
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `session` - The rendering session used for listing pages
    /// * `discoverer` - The candidate source
    /// * `extractor` - The record extractor
    /// * `cancel` - Token fired on external interruption
    /// * `max_consecutive_failures` - Navigation failures in a row treated as fatal
    pub fn new(
        session: S,
        discoverer: Discoverer,
        extractor: Extractor,
        cancel: CancellationToken,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            session,
            discoverer,
            extractor,
            cancel,
            failures: FailureTracker::new(max_consecutive_failures),
        }
    }

    /// Gives the listing session back, e.g. to close it
    pub fn into_session(self) -> S {
        self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Runs the sequential crawl loop
    ///
    /// 1. Check the interrupt token and the target
    /// 2. Discover while fewer candidates are pending than records are missing
    /// 3. Extract the next pending candidate
    /// 4. Append records; count skips; abort after too many navigation failures
    pub async fn run(&mut self, state: &mut CrawlState) -> Termination {
        tracing::info!("Starting crawl with target {}", state.target());

        let start_time = Instant::now();
        let mut processed: u64 = 0;

        let termination = loop {
            if self.cancel.is_cancelled() {
                break Termination::Interrupted;
            }
            if state.is_target_reached() {
                break Termination::Completed;
            }

            if state.pending_len() < state.remaining() && !state.listing_exhausted() {
                state.transition(CrawlPhase::Discovering);
                if let Err(e) = self.discoverer.discover_round(&mut self.session, state).await {
                    break Termination::Fatal(e.to_string());
                }
                continue;
            }

            let Some(candidate) = state.next_pending() else {
                break Termination::Exhausted;
            };

            state.transition(CrawlPhase::Extracting);
            state.stats_mut().attempted += 1;
            let outcome = self.extractor.extract(&mut self.session, &candidate.url).await;
            if let Some(termination) = absorb(state, &mut self.failures, candidate, outcome) {
                break termination;
            }

            processed += 1;
            if processed % 10 == 0 {
                report_progress(state, processed, start_time);
            }
        };

        finish(state, termination, start_time)
    }
}

/// Counts navigation failures in a row
#[derive(Debug, Clone)]
pub(crate) struct FailureTracker {
    consecutive: u32,
    limit: u32,
}

impl FailureTracker {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            consecutive: 0,
            limit,
        }
    }

    /// Records one outcome; returns true once the limit is reached
    fn record(&mut self, navigation_failed: bool) -> bool {
        if navigation_failed {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.limit > 0 && self.consecutive >= self.limit
    }
}

/// Applies one extraction outcome to the crawl state
///
/// Returns the termination if the outcome ends the run.
pub(crate) fn absorb(
    state: &mut CrawlState,
    failures: &mut FailureTracker,
    candidate: Candidate,
    outcome: Result<Extraction, SessionError>,
) -> Option<Termination> {
    match outcome {
        Ok(Extraction::Record(record)) => {
            failures.record(false);
            append(state, candidate, *record);
            None
        }
        Ok(Extraction::Skipped(reason)) => {
            state.stats_mut().record_skip(&reason);
            if failures.record(reason.is_navigation()) {
                return Some(Termination::Fatal(format!(
                    "{} consecutive navigation failures (last: {})",
                    failures.consecutive, candidate.url
                )));
            }
            None
        }
        Err(e) => {
            tracing::error!("Session failed on {}: {}", candidate.url, e);
            Some(Termination::Fatal(e.to_string()))
        }
    }
}

fn append(state: &mut CrawlState, candidate: Candidate, record: Record) {
    let id = record.id.clone();
    if state.append(candidate.index, record) {
        tracing::info!(
            "Record {} saved ({}/{})",
            id,
            state.completed_len(),
            state.target()
        );
    }
}

pub(crate) fn report_progress(state: &CrawlState, processed: u64, start_time: Instant) {
    let rate = processed as f64 / start_time.elapsed().as_secs_f64().max(f64::EPSILON);
    tracing::info!(
        "Progress: {} URLs processed, {}/{} records, {} pending, {:.2} URLs/sec",
        processed,
        state.completed_len(),
        state.target(),
        state.pending_len(),
        rate
    );
}

/// Moves the state into its terminal phase
pub(crate) fn finish(
    state: &mut CrawlState,
    termination: Termination,
    start_time: Instant,
) -> Termination {
    state.transition(termination.phase());
    if let Termination::Fatal(message) = &termination {
        state.stats_mut().fatal = Some(message.clone());
        tracing::error!("Crawl aborted: {}", message);
    }

    tracing::info!(
        "Crawl finished ({}): {} records in {:?}",
        termination,
        state.completed_len(),
        start_time.elapsed()
    );
    termination
}
