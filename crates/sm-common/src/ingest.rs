//! Scraper feed boundary: raw records are normalized here, before anything
//! downstream sees them.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    ListingId, NewListing,
    corrections::amount::{RawAmount, normalize_amount},
    rematch::{EventBus, MatchingEvent},
    store::{ListingStore, StoreError},
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("listing title is empty")]
    MissingTitle,
    #[error("invalid listing payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A listing as delivered by the scraper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListing {
    pub title: String,
    #[serde(default)]
    pub amount: Option<RawAmount>,
    /// ISO date (`2025-03-31`) or timestamp; anything else is dropped.
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub eligibility: Vec<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub description_embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub created: Vec<ListingId>,
    pub duplicates: Vec<ListingId>,
    /// Records rejected before reaching the store.
    pub rejected: usize,
}

pub fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    // Accept the date part of a full timestamp.
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

pub fn normalize_listing(raw: RawListing) -> Result<NewListing, IngestError> {
    let title = raw.title.trim().to_string();
    if title.is_empty() {
        return Err(IngestError::MissingTitle);
    }

    Ok(NewListing {
        title,
        amount: raw.amount.as_ref().and_then(normalize_amount),
        deadline: raw.deadline.as_deref().and_then(parse_deadline),
        description: raw.description.trim().to_string(),
        eligibility: raw
            .eligibility
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect(),
        source: raw.source.trim().to_string(),
        embedding: raw.description_embedding.filter(|v| !v.is_empty()),
    })
}

pub struct ListingIngestor {
    listings: Arc<dyn ListingStore>,
    bus: EventBus,
}

impl ListingIngestor {
    pub fn new(listings: Arc<dyn ListingStore>, bus: EventBus) -> Self {
        Self { listings, bus }
    }

    /// Stores a scraped batch and announces the newly created listings.
    /// Invalid records are skipped; a store failure aborts the batch.
    #[instrument(skip(self, batch), fields(batch = batch.len()))]
    pub async fn ingest(&self, batch: Vec<RawListing>) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();

        for raw in batch {
            let listing = match normalize_listing(raw) {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(error = %err, "scraped listing rejected");
                    report.rejected += 1;
                    continue;
                }
            };

            let outcome = self.listings.insert(&listing).await?;
            if outcome.created {
                report.created.push(outcome.id);
            } else {
                report.duplicates.push(outcome.id);
            }
        }

        if !report.created.is_empty() {
            self.bus.publish(MatchingEvent::ListingsChanged {
                listing_ids: report.created.clone(),
            });
        }

        info!(
            created = report.created.len(),
            duplicates = report.duplicates.len(),
            rejected = report.rejected,
            "listing batch ingested"
        );
        Ok(report)
    }

    /// JSON array entry point for webhook-style deliveries.
    pub async fn ingest_json(&self, payload: &str) -> Result<IngestReport, IngestError> {
        let batch: Vec<RawListing> = serde_json::from_str(payload)?;
        self.ingest(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryListingStore;

    #[test]
    fn deadline_accepts_dates_and_timestamps() {
        assert_eq!(
            parse_deadline("2025-03-31"),
            NaiveDate::from_ymd_opt(2025, 3, 31)
        );
        assert_eq!(
            parse_deadline("2025-03-31T23:59:00Z"),
            NaiveDate::from_ymd_opt(2025, 3, 31)
        );
        assert_eq!(parse_deadline("March 31"), None);
        assert_eq!(parse_deadline(""), None);
    }

    #[test]
    fn payload_amount_may_be_number_or_text() {
        let batch: Vec<RawListing> = serde_json::from_str(
            r#"[
                {"title": "A", "amount": 2500},
                {"title": "B", "amount": "$5,000"},
                {"title": "C", "amount": "TBD"},
                {"title": "D"}
            ]"#,
        )
        .unwrap();
        let amounts: Vec<Option<f64>> = batch
            .into_iter()
            .map(|raw| normalize_listing(raw).unwrap().amount)
            .collect();
        assert_eq!(amounts, vec![Some(2500.0), Some(5000.0), None, None]);
    }

    #[test]
    fn blank_title_is_rejected() {
        let raw = RawListing {
            title: "   ".into(),
            ..RawListing::default()
        };
        assert!(matches!(normalize_listing(raw), Err(IngestError::MissingTitle)));
    }

    #[tokio::test]
    async fn ingest_dedupes_and_announces_new_ids_only() {
        let store = Arc::new(MemoryListingStore::new());
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let ingestor = ListingIngestor::new(store.clone(), bus);

        let report = ingestor
            .ingest_json(
                r#"[
                    {"title": "Loran Award", "source": "loranscholar.ca", "amount": "$100,000"},
                    {"title": "LORAN  award!", "source": "loranscholar.ca"},
                    {"title": "", "source": "loranscholar.ca"},
                    {"title": "TD Scholarship", "source": "td.com"}
                ]"#,
            )
            .await
            .unwrap();

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.duplicates, vec![report.created[0]]);
        assert_eq!(report.rejected, 1);
        assert_eq!(
            events.recv().await.unwrap(),
            MatchingEvent::ListingsChanged {
                listing_ids: report.created.clone()
            }
        );

        let again = ingestor
            .ingest_json(r#"[{"title": "Loran Award", "source": "loranscholar.ca"}]"#)
            .await
            .unwrap();
        assert!(again.created.is_empty());
        assert!(events.try_recv().is_err());
    }
}
