//! Phase of the crawl frontier controller
use std::fmt;

/// Represents where a crawl run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Active Phases =====
    /// Visiting listing pages to collect candidate URLs
    Discovering,

    /// Extracting records from pending candidate URLs
    Extracting,

    // ===== Terminal Phases =====
    /// Target reached or source exhausted
    Done,

    /// Interrupted or hit an unrecoverable fault
    Aborted,
}

impl CrawlPhase {
    /// Returns true once the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true while the run is making progress
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the controller may move from this phase to `next`
    ///
    /// Active phases alternate freely and may end either way; terminal phases
    /// are final.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        match self {
            Self::Discovering => next != Self::Discovering,
            Self::Extracting => next != Self::Extracting,
            Self::Done | Self::Aborted => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Extracting => "extracting",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
