//! Online enrichment pipeline.
//!
//! Walks every pending catalog row through download, inference, and
//! write-back. Per-item failures (missing URL, failed download, bad reply)
//! are logged and skipped so one broken row never stalls the batch; store
//! failures abort the run because nothing useful can happen without the
//! catalog.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::GARMENT_TABLES;
use crate::attrs::parse_attributes;
use crate::error::Error;
use crate::prompt::{ATTRIBUTE_PROMPT, ImagePayload};
use crate::recon;
use crate::store::CatalogStore;
use crate::vision::VisionClient;

// ============================================================================
// Image Fetching
// ============================================================================

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("image download failed: {0}")]
    Http(String),

    #[error("image download returned {status} for {url}")]
    Status { status: u16, url: String },
}

/// Downloads garment images by URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ============================================================================
// Enrichment
// ============================================================================

/// Outcome of enriching one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    /// Rows that were awaiting attributes when the run started.
    pub pending: usize,
    /// Rows whose attributes were written back.
    pub enriched: usize,
    /// Rows passed over because of a per-item failure.
    pub skipped: usize,
}

/// Enrich every pending row of one table.
pub async fn enrich_table(
    store: &dyn CatalogStore,
    vision: &dyn VisionClient,
    images: &dyn ImageFetcher,
    table: &str,
) -> Result<TableReport, Error> {
    let items = store.pending_items(table).await?;
    info!("{}: {} items pending enrichment", table, items.len());

    let mut report = TableReport {
        table: table.to_string(),
        pending: items.len(),
        enriched: 0,
        skipped: 0,
    };

    for item in items {
        let Some(url) = item.image_url.as_deref() else {
            warn!("{} {} has no image URL, skipping", table, item.id);
            report.skipped += 1;
            continue;
        };

        let bytes = match images.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{} {}: image download failed ({}), skipping", table, item.id, e);
                report.skipped += 1;
                continue;
            }
        };

        let payload = ImagePayload::new(&bytes, url);
        let completion = match vision.describe(ATTRIBUTE_PROMPT, &payload).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!("{} {}: inference failed ({}), skipping", table, item.id, e);
                report.skipped += 1;
                continue;
            }
        };

        let record = match parse_attributes(&completion.text) {
            Ok(record) => record,
            Err(e) => {
                warn!("{} {}: reply did not parse ({}), skipping", table, item.id, e);
                report.skipped += 1;
                continue;
            }
        };

        store.save_attributes(table, &item.id, &record).await?;
        info!(
            "updated {}: {} - {} - {}",
            item.id, record.kind, record.color, record.style
        );
        report.enriched += 1;
    }

    Ok(report)
}

/// Enrich every garment table in order.
pub async fn enrich_all(
    store: &dyn CatalogStore,
    vision: &dyn VisionClient,
    images: &dyn ImageFetcher,
) -> Result<Vec<TableReport>, Error> {
    let mut reports = Vec::with_capacity(GARMENT_TABLES.len());
    for table in GARMENT_TABLES {
        reports.push(enrich_table(store, vision, images, table).await?);
    }
    Ok(reports)
}

// ============================================================================
// Pending Export
// ============================================================================

/// Export every table's pending rows to the batch handoff file, returning
/// per-table counts of items actually written (rows without an image URL
/// are not exportable).
pub async fn export_pending(
    store: &dyn CatalogStore,
    path: &Path,
) -> Result<Vec<(String, usize)>, Error> {
    let mut sections = Vec::new();
    let mut counts = Vec::new();
    for table in GARMENT_TABLES {
        let items = store.pending_items(table).await?;
        let exportable = items.iter().filter(|i| i.image_url.is_some()).count();
        counts.push((table.to_string(), exportable));
        sections.push((table.to_string(), items));
    }
    recon::write_pending_file(path, &sections)?;
    Ok(counts)
}

// ============================================================================
// Mock Fetcher (test support)
// ============================================================================

#[cfg(test)]
pub struct MockImageFetcher {
    results: std::sync::Mutex<std::collections::VecDeque<Result<Vec<u8>, FetchError>>>,
}

#[cfg(test)]
impl MockImageFetcher {
    pub fn new(replies: Vec<Vec<u8>>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<Vec<u8>, FetchError>>) -> Self {
        Self {
            results: std::sync::Mutex::new(results.into()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ImageFetcher for MockImageFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockImageFetcher ran out of scripted downloads")
    }
}

// ============================================================================
// Tests
// ============================================================================
