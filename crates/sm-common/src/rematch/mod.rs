pub mod events;
pub mod job;
pub mod summary;

use std::sync::Arc;

use futures::{StreamExt, stream};
use strum::AsRefStr;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    Listing, ListingId, Profile, ProfileId,
    embedding::{EmbeddingError, GuardedEmbedder, listing_text, profile_text},
    matching::{MatchingEngine, PlannedWrite, WriteMode},
    store::{ListingStore, MatchStore, MatchWrite, ProfileStore, StoreError},
};

pub use events::{EventBus, MatchingEvent, listen};
pub use job::{RematchHandle, RematchJobStatus};
pub use summary::{ProviderFailure, RematchSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSelection {
    All,
    Only(Vec<ListingId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RematchScope {
    /// One profile against every listing, after a profile edit.
    SingleProfile(ProfileId),
    /// Every profile against the selected listings.
    AllProfiles(ListingSelection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RematchTrigger {
    ProfileUpdated,
    ListingsIngested,
    Manual,
}

#[derive(Debug, Error)]
pub enum RematchError {
    #[error("profile {0} not found")]
    ProfileNotFound(ProfileId),
    #[error("failed to load profiles: {0}")]
    LoadProfiles(#[source] StoreError),
    #[error("failed to load listings: {0}")]
    LoadListings(#[source] StoreError),
}

#[derive(Debug, Clone)]
pub struct RematchConfig {
    /// Profiles evaluated concurrently within one batch.
    pub max_concurrent_profiles: usize,
}

impl Default for RematchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_profiles: 8,
        }
    }
}

impl RematchConfig {
    pub fn from_env() -> Self {
        Self {
            max_concurrent_profiles: std::env::var("REMATCH_MAX_CONCURRENT_PROFILES")
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .map(|n| n.max(1))
                .unwrap_or(Self::default().max_concurrent_profiles),
        }
    }
}

/// Drives the matching engine over profiles × listings and persists the
/// resulting writes. Holds no mutable state between runs.
pub struct Rematcher {
    profiles: Arc<dyn ProfileStore>,
    listings: Arc<dyn ListingStore>,
    matches: Arc<dyn MatchStore>,
    embedder: Arc<GuardedEmbedder>,
    engine: MatchingEngine,
    config: RematchConfig,
}

impl Rematcher {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        listings: Arc<dyn ListingStore>,
        matches: Arc<dyn MatchStore>,
        embedder: Arc<GuardedEmbedder>,
        engine: MatchingEngine,
        config: RematchConfig,
    ) -> Self {
        Self {
            profiles,
            listings,
            matches,
            embedder,
            engine,
            config,
        }
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    #[instrument(skip(self), fields(trigger = trigger.as_ref()))]
    pub async fn rematch(
        &self,
        scope: RematchScope,
        trigger: RematchTrigger,
    ) -> Result<RematchSummary, RematchError> {
        let mut summary = RematchSummary::default();

        let profile_ids = match &scope {
            RematchScope::SingleProfile(id) => {
                let exists = self
                    .profiles
                    .get(*id)
                    .await
                    .map_err(RematchError::LoadProfiles)?
                    .is_some();
                if !exists {
                    return Err(RematchError::ProfileNotFound(*id));
                }
                vec![*id]
            }
            RematchScope::AllProfiles(_) => self
                .profiles
                .list_ids()
                .await
                .map_err(RematchError::LoadProfiles)?,
        };

        let mut listings = match &scope {
            RematchScope::AllProfiles(ListingSelection::Only(ids)) => self
                .listings
                .list_by_ids(ids)
                .await
                .map_err(RematchError::LoadListings)?,
            _ => self
                .listings
                .list_all()
                .await
                .map_err(RematchError::LoadListings)?,
        };

        if profile_ids.is_empty() || listings.is_empty() {
            info!(
                profiles = profile_ids.len(),
                listings = listings.len(),
                "nothing to match"
            );
            return Ok(summary);
        }

        summary.listing_embedding_failures = self.resolve_listing_embeddings(&mut listings).await;

        let listings = listings.as_slice();
        let partial = matches!(scope, RematchScope::AllProfiles(ListingSelection::Only(_)));
        let per_profile: Vec<RematchSummary> = stream::iter(profile_ids)
            .map(|profile_id| self.rematch_profile(profile_id, listings, partial))
            .buffer_unordered(self.config.max_concurrent_profiles.max(1))
            .collect()
            .await;

        for profile_summary in per_profile {
            summary.merge(profile_summary);
        }

        info!(
            profiles = summary.profiles,
            total_considered = summary.total_considered,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            below_threshold = summary.below_threshold,
            failed_writes = summary.failed_writes,
            forced_fallbacks = summary.forced_fallbacks,
            retired_fallbacks = summary.retired_fallbacks,
            provider_failures = summary.provider_failures.len(),
            best_similarity = ?summary.best_similarity,
            "rematch finished"
        );
        Ok(summary)
    }

    /// Generates and backfills missing listing embeddings once per batch.
    /// Returns how many listings failed at the provider.
    async fn resolve_listing_embeddings(&self, listings: &mut [Listing]) -> usize {
        let missing: Vec<(usize, ListingId, String)> = listings
            .iter()
            .enumerate()
            .filter(|(_, listing)| listing.embedding.is_none())
            .map(|(idx, listing)| (idx, listing.id, listing_text(listing)))
            .collect();
        if missing.is_empty() {
            return 0;
        }

        let generated: Vec<(usize, ListingId, Result<Vec<f32>, EmbeddingError>)> =
            stream::iter(missing)
                .map(|(idx, listing_id, text)| async move {
                    (idx, listing_id, self.embedder.embed(&text).await)
                })
                .buffer_unordered(self.config.max_concurrent_profiles.max(1))
                .collect()
                .await;

        let mut failures = 0;
        for (idx, listing_id, result) in generated {
            match result {
                Ok(vector) => {
                    if let Err(err) = self.listings.set_embedding(listing_id, &vector).await {
                        warn!(listing_id, error = %err, "failed to backfill listing embedding");
                    }
                    listings[idx].embedding = Some(vector);
                }
                Err(EmbeddingError::EmptyInput) => {
                    debug!(listing_id, "listing has no embeddable text");
                }
                Err(err) => {
                    failures += 1;
                    warn!(listing_id, error = %err, "listing embedding failed");
                }
            }
        }
        failures
    }

    /// Evaluates and persists one profile. Never fails the batch: load and
    /// write errors are counted in the returned summary.
    ///
    /// A `partial` batch sees only some listings, so the fallback is planned
    /// against the profile's stored matches.
    #[instrument(skip(self, listings), fields(listings = listings.len()))]
    async fn rematch_profile(
        &self,
        profile_id: ProfileId,
        listings: &[Listing],
        partial: bool,
    ) -> RematchSummary {
        let mut summary = RematchSummary {
            profiles: 1,
            ..RematchSummary::default()
        };

        let mut profile = match self.profiles.get(profile_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                debug!("profile disappeared before evaluation");
                return RematchSummary::default();
            }
            Err(err) => {
                warn!(error = %err, "failed to load profile");
                summary.failed_profiles = 1;
                return summary;
            }
        };

        if let Some(failure) = self.ensure_profile_embedding(&mut profile).await {
            summary.provider_failures.push(failure);
        }

        let outcomes = self.engine.evaluate_profile(&profile, listings);
        let plan = if partial {
            let threshold = self.engine.config().publication_threshold;
            match self.matches.find_by_profile(profile_id, Some(threshold)).await {
                Ok(standing) => self.engine.plan_against(profile_id, &outcomes, Some(standing.as_slice())),
                Err(err) => {
                    warn!(error = %err, "failed to load standing matches; fallback skipped");
                    self.engine.plan_against(profile_id, &outcomes, None)
                }
            }
        } else {
            self.engine.plan(profile_id, &outcomes)
        };

        summary.total_considered = outcomes.len();
        summary.skipped = plan.skipped.len();
        summary.below_threshold = plan.below_threshold;
        summary.best_similarity = plan.best_similarity;
        summary.forced_fallbacks = usize::from(plan.fallback.is_some());

        let mut fallback_written = plan.fallback.is_none();
        for write in &plan.writes {
            match self.persist(profile_id, write).await {
                Ok(persisted) => {
                    match persisted {
                        Persisted::Created => summary.created += 1,
                        Persisted::Updated => summary.updated += 1,
                        Persisted::Absent => {}
                    }
                    fallback_written |= write.forced;
                }
                Err(err) => {
                    summary.failed_writes += 1;
                    warn!(
                        listing_id = write.listing_id,
                        error = %err,
                        "match write failed; left for the next rematch"
                    );
                }
            }
        }

        // Older forced records stay until their replacement is stored.
        if plan.retire_forced && fallback_written {
            match self.matches.clear_forced(profile_id, plan.fallback).await {
                Ok(cleared) => summary.retired_fallbacks = cleared as usize,
                Err(err) => {
                    summary.failed_writes += 1;
                    warn!(error = %err, "failed to retire older best-effort matches");
                }
            }
        }

        debug!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            fallback = ?plan.fallback,
            "profile rematched"
        );
        summary
    }

    /// Fills a missing profile embedding. Returns the provider failure, if
    /// any, so it is reported once for the profile.
    async fn ensure_profile_embedding(&self, profile: &mut Profile) -> Option<ProviderFailure> {
        if profile.embedding.is_some() {
            return None;
        }

        match self.embedder.embed(&profile_text(profile)).await {
            Ok(vector) => {
                if let Err(err) = self.profiles.set_embedding(profile.id, &vector).await {
                    warn!(profile_id = profile.id, error = %err, "failed to cache profile embedding");
                }
                profile.embedding = Some(vector);
                None
            }
            Err(EmbeddingError::EmptyInput) => {
                debug!(profile_id = profile.id, "profile has no embeddable text");
                None
            }
            Err(err) => {
                warn!(
                    profile_id = profile.id,
                    provider = self.embedder.provider_name(),
                    error = %err,
                    "profile embedding failed"
                );
                Some(ProviderFailure {
                    profile_id: profile.id,
                    message: err.to_string(),
                })
            }
        }
    }

    async fn persist(&self, profile_id: ProfileId, write: &PlannedWrite) -> Result<Persisted, StoreError> {
        let record = MatchWrite {
            score: write.score,
            reason: write.reason.clone(),
            forced: write.forced,
        };
        match write.mode {
            WriteMode::Upsert => {
                let outcome = self.matches.upsert(profile_id, write.listing_id, &record).await?;
                Ok(if outcome.created {
                    Persisted::Created
                } else {
                    Persisted::Updated
                })
            }
            WriteMode::RefreshOnly => {
                let existed = self.matches.refresh(profile_id, write.listing_id, &record).await?;
                Ok(if existed {
                    Persisted::Updated
                } else {
                    Persisted::Absent
                })
            }
        }
    }
}

enum Persisted {
    Created,
    Updated,
    Absent,
}
