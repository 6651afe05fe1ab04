pub mod memory;

use async_trait::async_trait;
use deadpool_postgres::PoolError;
use tokio_postgres::Error as PgError;

use crate::{ApplicationStatus, Listing, ListingId, MatchRecord, NewListing, Profile, ProfileId};

pub use memory::{MemoryListingStore, MemoryMatchStore, MemoryProfileStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("store error: {0}")]
    Backend(String),
}

/// Engine-owned fields of a match record. `status` is deliberately absent.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchWrite {
    pub score: f64,
    pub reason: String,
    pub forced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: ListingId,
    /// False when an existing listing with the same normalized title and
    /// source was returned instead.
    pub created: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepointSummary {
    /// Records moved to the surviving listing.
    pub moved: u64,
    /// Records dropped because the profile already matched the survivor.
    pub merged: u64,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, StoreError>;

    async fn list_ids(&self) -> Result<Vec<ProfileId>, StoreError>;

    /// Insert or replace the profile, including its cached embedding.
    async fn upsert(&self, profile: &Profile) -> Result<(), StoreError>;

    async fn set_embedding(&self, id: ProfileId, embedding: &[f32]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Listing>, StoreError>;

    /// Unknown ids are ignored.
    async fn list_by_ids(&self, ids: &[ListingId]) -> Result<Vec<Listing>, StoreError>;

    /// Deduplicated on normalized title + source.
    async fn insert(&self, listing: &NewListing) -> Result<InsertOutcome, StoreError>;

    async fn set_embedding(&self, id: ListingId, embedding: &[f32]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Insert with the default status, or update the engine-owned fields of
    /// the existing record.
    async fn upsert(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        write: &MatchWrite,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Update an existing record only. Returns whether one existed.
    async fn refresh(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        write: &MatchWrite,
    ) -> Result<bool, StoreError>;

    async fn get(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
    ) -> Result<Option<MatchRecord>, StoreError>;

    /// Records for a profile ordered by score, highest first. With a
    /// `min_score`, only records at or above it plus forced records.
    async fn find_by_profile(
        &self,
        profile_id: ProfileId,
        min_score: Option<f64>,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    async fn set_status(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        status: ApplicationStatus,
    ) -> Result<(), StoreError>;

    /// Clear `forced` on the profile's records, except the one for `keep`.
    /// Returns how many records changed.
    async fn clear_forced(
        &self,
        profile_id: ProfileId,
        keep: Option<ListingId>,
    ) -> Result<u64, StoreError>;

    /// Move match records from a merged listing onto its survivor.
    async fn repoint_listing(
        &self,
        from: ListingId,
        to: ListingId,
    ) -> Result<RepointSummary, StoreError>;
}

pub(crate) fn surfaced(record: &MatchRecord, min_score: Option<f64>) -> bool {
    match min_score {
        Some(min) => record.forced || record.score >= min,
        None => true,
    }
}

pub(crate) fn sort_by_score(records: &mut [MatchRecord]) {
    records.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.listing_id.cmp(&b.listing_id))
    });
}
