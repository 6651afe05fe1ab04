//! In-process stores backed by `Mutex<HashMap>`; used by tests and for
//! embedding the core without a database.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::Utc;

use super::{
    InsertOutcome, ListingStore, MatchStore, MatchWrite, ProfileStore, RepointSummary,
    StoreError, UpsertOutcome, sort_by_score, surfaced,
};
use crate::{
    ApplicationStatus, Listing, ListingId, MatchRecord, NewListing, Profile, ProfileId,
    normalize::normalize_title,
};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<BTreeMap<ProfileId, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: Mutex::new(profiles.into_iter().map(|p| (p.id, p)).collect()),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.lock().map_err(poisoned)?.get(&id).cloned())
    }

    async fn list_ids(&self) -> Result<Vec<ProfileId>, StoreError> {
        Ok(self.profiles.lock().map_err(poisoned)?.keys().copied().collect())
    }

    async fn upsert(&self, profile: &Profile) -> Result<(), StoreError> {
        self.profiles
            .lock()
            .map_err(poisoned)?
            .insert(profile.id, profile.clone());
        Ok(())
    }

    async fn set_embedding(&self, id: ProfileId, embedding: &[f32]) -> Result<(), StoreError> {
        let mut profiles = self.profiles.lock().map_err(poisoned)?;
        let profile = profiles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))?;
        profile.embedding = Some(embedding.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct ListingTable {
    rows: BTreeMap<ListingId, Listing>,
    keys: HashMap<(String, String), ListingId>,
    next_id: ListingId,
}

#[derive(Default)]
pub struct MemoryListingStore {
    table: Mutex<ListingTable>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds listings with fixed ids; later inserts continue after the
    /// highest seeded id.
    pub fn with_listings(listings: impl IntoIterator<Item = Listing>) -> Self {
        let mut table = ListingTable::default();
        for listing in listings {
            table.keys.insert(
                (normalize_title(&listing.title), listing.source.clone()),
                listing.id,
            );
            table.next_id = table.next_id.max(listing.id);
            table.rows.insert(listing.id, listing);
        }
        Self {
            table: Mutex::new(table),
        }
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn list_all(&self) -> Result<Vec<Listing>, StoreError> {
        Ok(self
            .table
            .lock()
            .map_err(poisoned)?
            .rows
            .values()
            .cloned()
            .collect())
    }

    async fn list_by_ids(&self, ids: &[ListingId]) -> Result<Vec<Listing>, StoreError> {
        let table = self.table.lock().map_err(poisoned)?;
        Ok(ids
            .iter()
            .filter_map(|id| table.rows.get(id).cloned())
            .collect())
    }

    async fn insert(&self, listing: &NewListing) -> Result<InsertOutcome, StoreError> {
        let mut table = self.table.lock().map_err(poisoned)?;
        let key = (normalize_title(&listing.title), listing.source.clone());
        if let Some(id) = table.keys.get(&key) {
            return Ok(InsertOutcome {
                id: *id,
                created: false,
            });
        }

        table.next_id += 1;
        let id = table.next_id;
        table.keys.insert(key, id);
        table.rows.insert(
            id,
            Listing {
                id,
                title: listing.title.clone(),
                amount: listing.amount,
                deadline: listing.deadline,
                description: listing.description.clone(),
                eligibility: listing.eligibility.clone(),
                source: listing.source.clone(),
                embedding: listing.embedding.clone(),
            },
        );
        Ok(InsertOutcome { id, created: true })
    }

    async fn set_embedding(&self, id: ListingId, embedding: &[f32]) -> Result<(), StoreError> {
        let mut table = self.table.lock().map_err(poisoned)?;
        let listing = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("listing {id}")))?;
        listing.embedding = Some(embedding.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMatchStore {
    records: Mutex<HashMap<(ProfileId, ListingId), MatchRecord>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, unfiltered, ordered by key.
    pub fn snapshot(&self) -> Vec<MatchRecord> {
        let records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut all: Vec<MatchRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| (r.profile_id, r.listing_id));
        all
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn upsert(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        write: &MatchWrite,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        let now = Utc::now();
        match records.get_mut(&(profile_id, listing_id)) {
            Some(existing) => {
                existing.score = write.score;
                existing.reason = write.reason.clone();
                existing.forced = write.forced;
                existing.updated_at = now;
                Ok(UpsertOutcome { created: false })
            }
            None => {
                records.insert(
                    (profile_id, listing_id),
                    MatchRecord {
                        profile_id,
                        listing_id,
                        score: write.score,
                        reason: write.reason.clone(),
                        forced: write.forced,
                        status: ApplicationStatus::default(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(UpsertOutcome { created: true })
            }
        }
    }

    async fn refresh(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        write: &MatchWrite,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        let Some(existing) = records.get_mut(&(profile_id, listing_id)) else {
            return Ok(false);
        };
        existing.score = write.score;
        existing.reason = write.reason.clone();
        existing.forced = write.forced;
        existing.updated_at = Utc::now();
        Ok(true)
    }

    async fn get(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
    ) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .map_err(poisoned)?
            .get(&(profile_id, listing_id))
            .cloned())
    }

    async fn find_by_profile(
        &self,
        profile_id: ProfileId,
        min_score: Option<f64>,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let records = self.records.lock().map_err(poisoned)?;
        let mut found: Vec<MatchRecord> = records
            .values()
            .filter(|r| r.profile_id == profile_id && surfaced(r, min_score))
            .cloned()
            .collect();
        sort_by_score(&mut found);
        Ok(found)
    }

    async fn set_status(
        &self,
        profile_id: ProfileId,
        listing_id: ListingId,
        status: ApplicationStatus,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        let record = records.get_mut(&(profile_id, listing_id)).ok_or_else(|| {
            StoreError::NotFound(format!("match ({profile_id}, {listing_id})"))
        })?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_forced(
        &self,
        profile_id: ProfileId,
        keep: Option<ListingId>,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        let mut cleared = 0;
        for record in records.values_mut().filter(|r| {
            r.profile_id == profile_id && r.forced && Some(r.listing_id) != keep
        }) {
            record.forced = false;
            record.updated_at = Utc::now();
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn repoint_listing(
        &self,
        from: ListingId,
        to: ListingId,
    ) -> Result<RepointSummary, StoreError> {
        let mut summary = RepointSummary::default();
        if from == to {
            return Ok(summary);
        }

        let mut records = self.records.lock().map_err(poisoned)?;
        let keys: Vec<(ProfileId, ListingId)> = records
            .keys()
            .filter(|(_, listing_id)| *listing_id == from)
            .copied()
            .collect();

        for key in keys {
            let Some(mut record) = records.remove(&key) else {
                continue;
            };
            let profile_id = key.0;
            match records.get_mut(&(profile_id, to)) {
                Some(survivor) => {
                    if survivor.status == ApplicationStatus::NotStarted
                        && record.status != ApplicationStatus::NotStarted
                    {
                        survivor.status = record.status;
                        survivor.updated_at = Utc::now();
                    }
                    summary.merged += 1;
                }
                None => {
                    record.listing_id = to;
                    record.updated_at = Utc::now();
                    records.insert((profile_id, to), record);
                    summary.moved += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(score: f64, reason: &str) -> MatchWrite {
        MatchWrite {
            score,
            reason: reason.into(),
            forced: false,
        }
    }

    #[tokio::test]
    async fn upsert_creates_once_and_keeps_status() {
        let store = MemoryMatchStore::new();

        assert!(store.upsert(1, 10, &write(0.7, "70%")).await.unwrap().created);
        store
            .set_status(1, 10, ApplicationStatus::Submitted)
            .await
            .unwrap();
        let second = store.upsert(1, 10, &write(0.8, "80%")).await.unwrap();

        assert!(!second.created);
        let record = store.get(1, 10).await.unwrap().unwrap();
        assert_eq!(record.score, 0.8);
        assert_eq!(record.status, ApplicationStatus::Submitted);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn refresh_never_inserts() {
        let store = MemoryMatchStore::new();
        assert!(!store.refresh(1, 10, &write(0.2, "20%")).await.unwrap());
        assert!(store.get(1, 10).await.unwrap().is_none());

        store.upsert(1, 10, &write(0.7, "70%")).await.unwrap();
        assert!(store.refresh(1, 10, &write(0.2, "20%")).await.unwrap());
        assert_eq!(store.get(1, 10).await.unwrap().unwrap().score, 0.2);
    }

    #[tokio::test]
    async fn find_by_profile_filters_and_sorts() {
        let store = MemoryMatchStore::new();
        store.upsert(1, 10, &write(0.6, "60%")).await.unwrap();
        store.upsert(1, 11, &write(0.9, "90%")).await.unwrap();
        store.upsert(1, 12, &write(0.3, "30%")).await.unwrap();
        store
            .upsert(
                1,
                13,
                &MatchWrite {
                    score: 0.2,
                    reason: "best-effort".into(),
                    forced: true,
                },
            )
            .await
            .unwrap();
        store.upsert(2, 10, &write(0.9, "90%")).await.unwrap();

        let surfaced: Vec<ListingId> = store
            .find_by_profile(1, Some(0.5))
            .await
            .unwrap()
            .iter()
            .map(|r| r.listing_id)
            .collect();
        assert_eq!(surfaced, vec![11, 10, 13]);

        assert_eq!(store.find_by_profile(1, None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn set_status_on_missing_match_is_not_found() {
        let store = MemoryMatchStore::new();
        let err = store
            .set_status(1, 2, ApplicationStatus::Awarded)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn clear_forced_spares_the_kept_listing_and_other_profiles() {
        let store = MemoryMatchStore::new();
        let forced = MatchWrite {
            forced: true,
            ..write(0.2, "best-effort")
        };
        store.upsert(1, 10, &forced).await.unwrap();
        store.upsert(1, 11, &forced).await.unwrap();
        store.upsert(2, 10, &forced).await.unwrap();

        assert_eq!(store.clear_forced(1, Some(11)).await.unwrap(), 1);
        assert!(!store.get(1, 10).await.unwrap().unwrap().forced);
        assert!(store.get(1, 11).await.unwrap().unwrap().forced);
        assert!(store.get(2, 10).await.unwrap().unwrap().forced);

        assert_eq!(store.clear_forced(1, None).await.unwrap(), 1);
        assert!(store.find_by_profile(1, Some(0.5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repoint_moves_and_merges_with_status_carry_over() {
        let store = MemoryMatchStore::new();
        // profile 1 matched both listings; profile 2 only the merged one
        store.upsert(1, 10, &write(0.6, "60%")).await.unwrap();
        store.upsert(1, 20, &write(0.7, "70%")).await.unwrap();
        store
            .set_status(1, 20, ApplicationStatus::InProgress)
            .await
            .unwrap();
        store.upsert(2, 20, &write(0.8, "80%")).await.unwrap();

        let summary = store.repoint_listing(20, 10).await.unwrap();
        assert_eq!(summary, RepointSummary { moved: 1, merged: 1 });

        let kept = store.get(1, 10).await.unwrap().unwrap();
        assert_eq!(kept.score, 0.6);
        assert_eq!(kept.status, ApplicationStatus::InProgress);
        assert!(store.get(2, 10).await.unwrap().is_some());
        assert!(store.get(1, 20).await.unwrap().is_none());
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn listing_insert_dedupes_on_title_and_source() {
        let store = MemoryListingStore::new();
        let listing = NewListing {
            title: "STEM Award 2025!".into(),
            source: "https://studentawards.com".into(),
            ..NewListing::default()
        };
        let first = store.insert(&listing).await.unwrap();
        let dup = store
            .insert(&NewListing {
                title: "stem   award 2025".into(),
                ..listing.clone()
            })
            .await
            .unwrap();
        let other_source = store
            .insert(&NewListing {
                source: "https://yconic.com".into(),
                ..listing.clone()
            })
            .await
            .unwrap();

        assert!(first.created);
        assert_eq!(dup, InsertOutcome { id: first.id, created: false });
        assert!(other_source.created);
        assert_ne!(other_source.id, first.id);
    }

    #[tokio::test]
    async fn embeddings_backfill_existing_rows_only() {
        let listings = MemoryListingStore::new();
        assert!(matches!(
            listings.set_embedding(99, &[1.0]).await,
            Err(StoreError::NotFound(_))
        ));

        let profiles = MemoryProfileStore::with_profiles([Profile {
            id: 3,
            ..Profile::default()
        }]);
        profiles.set_embedding(3, &[0.5, 0.5]).await.unwrap();
        assert_eq!(
            profiles.get(3).await.unwrap().unwrap().embedding,
            Some(vec![0.5, 0.5])
        );
    }
}
