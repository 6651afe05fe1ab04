use serde::Serialize;

use crate::ProfileId;

/// First embedding-provider failure seen for a profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub profile_id: ProfileId,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RematchSummary {
    pub profiles: usize,
    /// Profile × listing pairs evaluated.
    pub total_considered: usize,
    pub created: usize,
    /// Existing records rewritten, refreshes included.
    pub updated: usize,
    pub skipped: usize,
    pub below_threshold: usize,
    pub failed_writes: usize,
    /// Profiles that could not be loaded mid-batch.
    pub failed_profiles: usize,
    pub forced_fallbacks: usize,
    /// Earlier best-effort matches demoted because a real match or a better
    /// fallback took their place.
    pub retired_fallbacks: usize,
    pub best_similarity: Option<f64>,
    pub provider_failures: Vec<ProviderFailure>,
    /// Listings whose embedding could not be generated this batch.
    pub listing_embedding_failures: usize,
}

impl RematchSummary {
    pub fn merge(&mut self, other: RematchSummary) {
        self.profiles += other.profiles;
        self.total_considered += other.total_considered;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.below_threshold += other.below_threshold;
        self.failed_writes += other.failed_writes;
        self.failed_profiles += other.failed_profiles;
        self.forced_fallbacks += other.forced_fallbacks;
        self.retired_fallbacks += other.retired_fallbacks;
        self.best_similarity = match (self.best_similarity, other.best_similarity) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.provider_failures.extend(other.provider_failures);
        self.listing_embedding_failures += other.listing_embedding_failures;
    }

    pub fn has_failures(&self) -> bool {
        self.failed_writes > 0
            || self.failed_profiles > 0
            || !self.provider_failures.is_empty()
            || self.listing_embedding_failures > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_counts_and_keeps_best_similarity() {
        let mut total = RematchSummary {
            profiles: 1,
            created: 2,
            best_similarity: Some(0.4),
            ..RematchSummary::default()
        };
        total.merge(RematchSummary {
            profiles: 1,
            updated: 3,
            best_similarity: Some(0.7),
            provider_failures: vec![ProviderFailure {
                profile_id: 9,
                message: "timeout".into(),
            }],
            ..RematchSummary::default()
        });
        total.merge(RematchSummary::default());

        assert_eq!(total.profiles, 2);
        assert_eq!(total.created, 2);
        assert_eq!(total.updated, 3);
        assert_eq!(total.best_similarity, Some(0.7));
        assert_eq!(total.provider_failures.len(), 1);
        assert!(total.has_failures());
    }

    #[test]
    fn serializes_for_log_output() {
        let json = serde_json::to_value(RematchSummary::default()).unwrap();
        assert_eq!(json["created"], 0);
        assert!(json["best_similarity"].is_null());
    }
}
