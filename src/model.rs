//! Output data model
//!
//! Records, replies and media references as they are extracted from one rendered
//! page visit and persisted in the JSON dumps.

use serde::{Deserialize, Serialize};

/// A timestamp as found on the page plus its normalized form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Value read from the page (attribute or text), if the element was located
    pub raw: Option<String>,

    /// ISO-8601 rendering with offset, or None if no configured format matched
    pub iso: Option<String>,
}

impl Timestamp {
    /// A timestamp whose element could not be located
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Interaction counts of a record; unresolved counts are zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCounts {
    pub likes: u64,
    pub reposts: u64,
    pub quotes: u64,
    pub views: u64,
}

/// A media reference attached to a record or reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Canonical (full resolution) URL
    pub url: String,

    /// Recognized text. Absent: OCR has not run. Empty: OCR ran and found nothing
    /// (or failed, see `ocr_error`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Why recognition failed for this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<String>,
}

impl Media {
    /// Creates a media reference that has not been through OCR
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: None,
            ocr_error: None,
        }
    }

    /// Returns true if OCR still has to run for this entry
    pub fn needs_ocr(&self) -> bool {
        self.text.is_none()
    }
}

/// A reply attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub author: Option<String>,
    pub text: Option<String>,
    pub timestamp: Timestamp,
    pub media: Vec<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
}

/// One forum post or thread, the unit of output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier derived from the canonical URL
    pub id: String,
    pub url: String,
    pub author: Option<String>,
    /// Primary text; None when no body could be located
    pub text: Option<String>,
    pub timestamp: Timestamp,
    pub counts: InteractionCounts,
    pub media: Vec<Media>,
    pub replies: Vec<Reply>,
}

impl Record {
    /// Iterates over every media entry of the record and its replies
    pub fn all_media(&self) -> impl Iterator<Item = &Media> {
        self.media
            .iter()
            .chain(self.replies.iter().flat_map(|r| r.media.iter()))
    }

    /// Mutable access to every media entry of the record and its replies
    pub fn all_media_mut(&mut self) -> impl Iterator<Item = &mut Media> {
        self.media
            .iter_mut()
            .chain(self.replies.iter_mut().flat_map(|r| r.media.iter_mut()))
    }
}
