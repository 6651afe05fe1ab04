use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{debug, instrument};

use super::{PgPool, util::TimedClientExt};
use crate::{
    Listing, ListingId, NewListing,
    normalize::normalize_title,
    store::{InsertOutcome, ListingStore, StoreError},
};

const LISTING_COLUMNS: &str =
    "id, title, amount, deadline, description, eligibility, source, embedding";

pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn listing_from_row(row: &Row) -> Result<Listing, StoreError> {
    Ok(Listing {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        amount: row.try_get("amount")?,
        deadline: row.try_get("deadline")?,
        description: row.try_get("description")?,
        eligibility: row.try_get("eligibility")?,
        source: row.try_get("source")?,
        embedding: row.try_get("embedding")?,
    })
}

#[async_trait]
impl ListingStore for PgListingStore {
    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Listing>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {LISTING_COLUMNS} FROM scholar.listings ORDER BY id");
        let rows = client.timed_query(&sql, &[], "listings.list_all").await?;
        rows.iter().map(listing_from_row).collect()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn list_by_ids(&self, ids: &[ListingId]) -> Result<Vec<Listing>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM scholar.listings WHERE id = ANY($1) ORDER BY id"
        );
        let rows = client
            .timed_query(&sql, &[&ids], "listings.list_by_ids")
            .await?;
        rows.iter().map(listing_from_row).collect()
    }

    #[instrument(skip(self, listing), fields(title = %listing.title, source = %listing.source))]
    async fn insert(&self, listing: &NewListing) -> Result<InsertOutcome, StoreError> {
        let client = self.pool.get().await?;
        let title_key = normalize_title(&listing.title);

        let inserted = client
            .timed_query_opt(
                "INSERT INTO scholar.listings (
                    title, title_key, amount, deadline, description, eligibility, source, embedding
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (title_key, source) DO NOTHING
                RETURNING id",
                &[
                    &listing.title,
                    &title_key,
                    &listing.amount,
                    &listing.deadline,
                    &listing.description,
                    &listing.eligibility,
                    &listing.source,
                    &listing.embedding,
                ],
                "listings.insert",
            )
            .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome {
                id: row.try_get(0)?,
                created: true,
            });
        }

        let existing = client
            .timed_query_opt(
                "SELECT id FROM scholar.listings WHERE title_key = $1 AND source = $2",
                &[&title_key, &listing.source],
                "listings.find_duplicate",
            )
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("listing '{title_key}'")))?;

        let id: ListingId = existing.try_get(0)?;
        debug!(listing_id = id, "duplicate listing ignored");
        Ok(InsertOutcome { id, created: false })
    }

    #[instrument(skip(self, embedding), fields(dimension = embedding.len()))]
    async fn set_embedding(&self, id: ListingId, embedding: &[f32]) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .timed_execute(
                "UPDATE scholar.listings SET embedding = $2 WHERE id = $1",
                &[&id, &embedding],
                "listings.set_embedding",
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("listing {id}")));
        }
        Ok(())
    }
}
