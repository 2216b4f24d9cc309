use crate::model::Record;
use crate::output::CrawlStatistics;
use crate::state::CrawlPhase;
use std::collections::{HashSet, VecDeque};

/// A discovered URL waiting for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Position in discovery order
    pub index: usize,
    pub url: String,
}

/// Everything a crawl run accumulates
///
/// Owned by a single controller. Records are appended in completion order and
/// never exceed the target; once appended they are not modified.
#[derive(Debug)]
pub struct CrawlState {
    target: usize,
    phase: CrawlPhase,
    seen: HashSet<String>,
    pending: VecDeque<Candidate>,
    completed: Vec<Record>,
    discovery_order: Vec<usize>,
    cursor: u32,
    listing_exhausted: bool,
    stats: CrawlStatistics,
}

impl CrawlState {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            phase: CrawlPhase::Discovering,
            seen: HashSet::new(),
            pending: VecDeque::new(),
            completed: Vec::new(),
            discovery_order: Vec::new(),
            cursor: 1,
            listing_exhausted: false,
            stats: CrawlStatistics::default(),
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves to `next` if the phase machine allows it
    ///
    /// Returns false (and leaves the phase untouched) otherwise.
    pub fn transition(&mut self, next: CrawlPhase) -> bool {
        if self.phase == next {
            return true;
        }
        if !self.phase.can_transition_to(next) {
            tracing::debug!("Ignoring transition {} -> {}", self.phase, next);
            return false;
        }
        tracing::debug!("Crawl phase {} -> {}", self.phase, next);
        self.phase = next;
        true
    }

    /// Records a discovered URL
    ///
    /// Returns its discovery index, or `None` if the URL was seen before.
    pub fn offer(&mut self, url: &str) -> Option<usize> {
        if self.seen.contains(url) {
            return None;
        }
        let index = self.seen.len();
        self.seen.insert(url.to_string());
        self.pending.push_back(Candidate {
            index,
            url: url.to_string(),
        });
        self.stats.discovered += 1;
        Some(index)
    }

    pub fn is_seen(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    pub fn next_pending(&mut self) -> Option<Candidate> {
        self.pending.pop_front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Records still needed to reach the target
    pub fn remaining(&self) -> usize {
        self.target.saturating_sub(self.completed.len())
    }

    pub fn is_target_reached(&self) -> bool {
        self.completed.len() >= self.target
    }

    /// Appends a completed record
    ///
    /// Refuses (returning false) once the target is reached or after the run
    /// has ended.
    pub fn append(&mut self, index: usize, record: Record) -> bool {
        if self.is_target_reached() || self.phase.is_terminal() {
            tracing::debug!("Dropping record {}: target already reached", record.id);
            return false;
        }
        self.completed.push(record);
        self.discovery_order.push(index);
        self.stats.completed += 1;
        true
    }

    pub fn records(&self) -> &[Record] {
        &self.completed
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    /// Reorders completed records by discovery index
    pub fn sort_by_discovery(&mut self) {
        let mut paired: Vec<(usize, Record)> = self
            .discovery_order
            .drain(..)
            .zip(self.completed.drain(..))
            .collect();
        paired.sort_by_key(|(index, _)| *index);
        for (index, record) in paired {
            self.discovery_order.push(index);
            self.completed.push(record);
        }
    }

    /// Next listing page number (1-based)
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn advance_cursor(&mut self) {
        self.cursor += 1;
        self.stats.listing_rounds += 1;
    }

    pub fn listing_exhausted(&self) -> bool {
        self.listing_exhausted
    }

    pub fn mark_listing_exhausted(&mut self) {
        if !self.listing_exhausted {
            tracing::info!(
                "Listing exhausted after {} rounds ({} URLs discovered)",
                self.stats.listing_rounds,
                self.seen.len()
            );
        }
        self.listing_exhausted = true;
    }

    pub fn stats(&self) -> &CrawlStatistics {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CrawlStatistics {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InteractionCounts, Timestamp};

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            url: format!("https://forum.example/p/{}", id),
            author: None,
            text: Some(String::new()),
            timestamp: Timestamp::missing(),
            counts: InteractionCounts::default(),
            media: vec![],
            replies: vec![],
        }
    }

    #[test]
    fn test_offer_deduplicates() {
        let mut state = CrawlState::new(10);
        assert_eq!(state.offer("https://forum.example/p/1"), Some(0));
        assert_eq!(state.offer("https://forum.example/p/2"), Some(1));
        assert_eq!(state.offer("https://forum.example/p/1"), None);
        assert_eq!(state.seen_len(), 2);
        assert_eq!(state.pending_len(), 2);
        assert_eq!(state.stats().discovered, 2);
    }

    #[test]
    fn test_pending_fifo() {
        let mut state = CrawlState::new(10);
        state.offer("a");
        state.offer("b");
        assert_eq!(state.next_pending().map(|c| c.url), Some("a".to_string()));
        assert_eq!(state.next_pending().map(|c| c.index), Some(1));
        assert_eq!(state.next_pending(), None);
        assert!(state.is_seen("a"));
    }

    #[test]
    fn test_append_never_exceeds_target() {
        let mut state = CrawlState::new(2);
        assert!(state.append(0, record("1")));
        assert!(state.append(1, record("2")));
        assert!(!state.append(2, record("3")));
        assert_eq!(state.completed_len(), 2);
        assert_eq!(state.remaining(), 0);
        assert!(state.is_target_reached());
    }

    #[test]
    fn test_append_refused_after_terminal() {
        let mut state = CrawlState::new(5);
        assert!(state.transition(CrawlPhase::Aborted));
        assert!(!state.append(0, record("1")));
    }

    #[test]
    fn test_terminal_transition_is_final() {
        let mut state = CrawlState::new(5);
        assert!(state.transition(CrawlPhase::Extracting));
        assert!(state.transition(CrawlPhase::Done));
        assert!(!state.transition(CrawlPhase::Aborted));
        assert_eq!(state.phase(), CrawlPhase::Done);
    }

    #[test]
    fn test_sort_by_discovery() {
        let mut state = CrawlState::new(5);
        state.append(2, record("c"));
        state.append(0, record("a"));
        state.append(1, record("b"));
        state.sort_by_discovery();
        let ids: Vec<&str> = state.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cursor_and_exhaustion() {
        let mut state = CrawlState::new(5);
        assert_eq!(state.cursor(), 1);
        state.advance_cursor();
        assert_eq!(state.cursor(), 2);
        assert_eq!(state.stats().listing_rounds, 1);
        assert!(!state.listing_exhausted());
        state.mark_listing_exhausted();
        assert!(state.listing_exhausted());
    }
}
