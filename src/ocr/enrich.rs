use crate::fetch::FetchSession;
use crate::model::{Media, Record};
use crate::ocr::OcrEngine;
use futures_util::stream::{self, StreamExt};

/// Counts of one enrichment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub recognized: usize,
    pub failed: usize,
}

impl EnrichSummary {
    pub fn total(&self) -> usize {
        self.recognized + self.failed
    }

    fn merge(&mut self, other: EnrichSummary) {
        self.recognized += other.recognized;
        self.failed += other.failed;
    }
}

/// Attaches recognized text to the media of records
///
/// Only entries whose text is absent are processed, so running the pass
/// again over an enriched dump only fills what is still missing.
pub struct Enricher<E: OcrEngine> {
    fetch: FetchSession,
    engine: E,
    concurrency: usize,
}

impl<E: OcrEngine> Enricher<E> {
    pub fn new(fetch: FetchSession, engine: E, concurrency: usize) -> Self {
        Self {
            fetch,
            engine,
            concurrency: concurrency.max(1),
        }
    }

    /// Enriches the media of one record and of all its replies
    pub async fn enrich(&self, record: &mut Record) -> EnrichSummary {
        let pending: Vec<&mut Media> = record.all_media_mut().filter(|m| m.needs_ocr()).collect();
        if pending.is_empty() {
            return EnrichSummary::default();
        }

        let outcomes: Vec<bool> = stream::iter(pending)
            .map(|media| self.enrich_media(media))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let recognized = outcomes.iter().filter(|ok| **ok).count();
        EnrichSummary {
            recognized,
            failed: outcomes.len() - recognized,
        }
    }

    /// Enriches every record, logging progress
    pub async fn enrich_all(&self, records: &mut [Record]) -> EnrichSummary {
        let total = records.len();
        let mut summary = EnrichSummary::default();
        for (i, record) in records.iter_mut().enumerate() {
            summary.merge(self.enrich(record).await);
            tracing::info!("{}/{} complete", i + 1, total);
        }
        summary
    }

    async fn enrich_media(&self, media: &mut Media) -> bool {
        match self.recognize(&media.url).await {
            Ok(text) => {
                media.text = Some(text.trim().to_string());
                media.ocr_error = None;
                true
            }
            Err(message) => {
                tracing::warn!("OCR failed for {}: {}", media.url, message);
                media.text = Some(String::new());
                media.ocr_error = Some(message);
                false
            }
        }
    }

    async fn recognize(&self, url: &str) -> Result<String, String> {
        let bytes = self.fetch.fetch(url, None).await.map_err(|e| e.to_string())?;
        self.engine
            .recognize_text(&bytes)
            .await
            .map_err(|e| e.to_string())
    }
}
