use std::{cmp::Ordering, collections::HashSet};

use super::{
    decision::{GateDecision, MatchDecision, PairOutcome, ScoreSource, SkipReason},
    program_gate,
    similarity::cosine_similarity,
    universal,
};
use crate::{
    Listing, ListingId, MatchRecord, Profile, ProfileId,
    corrections::{field_of_study::normalize_program, region::has_regional_signal},
    normalize::combined_listing_text,
};

pub const UNIVERSAL_REASON: &str = "universal match";
pub const BEST_EFFORT_PREFIX: &str = "best-effort match";

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingEngineConfig {
    /// Minimum score for a match to be created and surfaced (inclusive).
    pub publication_threshold: f64,
    /// Fixed score assigned to universal matches instead of similarity.
    pub universal_score: f64,
    /// Create one forced match per profile when nothing clears the threshold.
    pub fallback_enabled: bool,
}

impl Default for MatchingEngineConfig {
    fn default() -> Self {
        Self {
            publication_threshold: 0.5,
            universal_score: 0.95,
            fallback_enabled: true,
        }
    }
}

impl MatchingEngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            publication_threshold: std::env::var("MATCH_PUBLICATION_THRESHOLD")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(defaults.publication_threshold),
            universal_score: std::env::var("MATCH_UNIVERSAL_SCORE")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(defaults.universal_score),
            fallback_enabled: std::env::var("MATCH_FALLBACK_ENABLED")
                .ok()
                .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.fallback_enabled),
        }
    }

    /// Read-time visibility: at or above the threshold, or the profile's
    /// forced best-effort match.
    pub fn surfaces(&self, score: f64, forced: bool) -> bool {
        forced || score >= self.publication_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert with the default status, or update score/reason in place.
    Upsert,
    /// Update an existing record only; never inserts.
    RefreshOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    pub listing_id: ListingId,
    pub score: f64,
    pub reason: String,
    pub forced: bool,
    pub mode: WriteMode,
}

/// Everything the engine decided for one profile, ready to persist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPlan {
    pub profile_id: ProfileId,
    pub writes: Vec<PlannedWrite>,
    pub skipped: Vec<(ListingId, SkipReason)>,
    pub published: usize,
    pub below_threshold: usize,
    /// Best cosine similarity seen (universal scores excluded).
    pub best_similarity: Option<f64>,
    /// Listing promoted by the best-effort fallback, if any.
    pub fallback: Option<ListingId>,
    /// Clear `forced` on the profile's other records once the writes land.
    pub retire_forced: bool,
}

pub struct MatchingEngine {
    config: MatchingEngineConfig,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(MatchingEngineConfig::default())
    }
}

impl MatchingEngine {
    pub fn new(config: MatchingEngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingEngineConfig {
        &self.config
    }

    /// Program gate → universal check → cosine similarity for one pair.
    ///
    /// Embeddings are taken as they are on the inputs; a missing side is a
    /// skip, never a fabricated score.
    pub fn decide(&self, profile: &Profile, listing: &Listing) -> PairOutcome {
        let text = combined_listing_text(listing);

        if let Some(field) = profile.program.as_deref().and_then(normalize_program) {
            if let GateDecision::Reject { reason } = program_gate::evaluate_text(&text, &field) {
                return PairOutcome::Skip {
                    listing_id: listing.id,
                    reason: SkipReason::ProgramGate { reason },
                };
            }
        }

        if has_regional_signal(profile) && universal::universal_text(&text, &listing.source) {
            return PairOutcome::Scored(MatchDecision {
                listing_id: listing.id,
                score: self.config.universal_score,
                reason: UNIVERSAL_REASON.to_string(),
                source: ScoreSource::Universal,
            });
        }

        let (Some(profile_embedding), Some(listing_embedding)) =
            (profile.embedding.as_deref(), listing.embedding.as_deref())
        else {
            return PairOutcome::Skip {
                listing_id: listing.id,
                reason: SkipReason::MissingEmbedding {
                    profile_missing: profile.embedding.is_none(),
                    listing_missing: listing.embedding.is_none(),
                },
            };
        };

        match cosine_similarity(profile_embedding, listing_embedding) {
            Some(similarity) => {
                let score = f64::from(similarity).clamp(0.0, 1.0);
                PairOutcome::Scored(MatchDecision {
                    listing_id: listing.id,
                    score,
                    reason: similarity_reason(score),
                    source: ScoreSource::Similarity,
                })
            }
            None => PairOutcome::Skip {
                listing_id: listing.id,
                reason: SkipReason::NotComputable,
            },
        }
    }

    pub fn evaluate_profile(&self, profile: &Profile, listings: &[Listing]) -> Vec<PairOutcome> {
        listings
            .iter()
            .map(|listing| self.decide(profile, listing))
            .collect()
    }

    /// Turns a profile's outcomes into writes when the outcomes cover
    /// every listing.
    ///
    /// Decisions at/above the threshold are upserted; those below only
    /// refresh records that already exist. When nothing clears the
    /// threshold, the single best-scoring pair is upserted as a forced
    /// best-effort match.
    pub fn plan(&self, profile_id: ProfileId, outcomes: &[PairOutcome]) -> MatchPlan {
        self.plan_against(profile_id, outcomes, Some(Default::default()))
    }

    /// Plans a batch that covers only part of the listing corpus.
    ///
    /// `standing` holds the profile's surfaced records (see
    /// `MatchStore::find_by_profile`). Records for listings outside the batch
    /// still count: a published one suppresses the fallback, and a forced one
    /// keeps its place unless the batch offers a better candidate. `None`
    /// means the records could not be read, so no fallback is attempted.
    pub fn plan_against(
        &self,
        profile_id: ProfileId,
        outcomes: &[PairOutcome],
        standing: Option<&[MatchRecord]>,
    ) -> MatchPlan {
        let threshold = self.config.publication_threshold;
        let mut plan = MatchPlan {
            profile_id,
            ..MatchPlan::default()
        };

        let mut scored: Vec<&MatchDecision> = Vec::new();
        for outcome in outcomes {
            match outcome {
                PairOutcome::Skip { listing_id, reason } => {
                    plan.skipped.push((*listing_id, reason.clone()));
                }
                PairOutcome::Scored(decision) => {
                    if decision.source == ScoreSource::Similarity {
                        plan.best_similarity = Some(
                            plan.best_similarity
                                .map_or(decision.score, |best| best.max(decision.score)),
                        );
                    }
                    scored.push(decision);
                }
            }
        }

        plan.published = scored.iter().filter(|d| d.meets(threshold)).count();
        plan.below_threshold = scored.len() - plan.published;

        let in_batch: HashSet<ListingId> = scored.iter().map(|d| d.listing_id).collect();
        let outside: Vec<&MatchRecord> = standing
            .unwrap_or_default()
            .iter()
            .filter(|r| r.profile_id == profile_id && !in_batch.contains(&r.listing_id))
            .collect();
        let published_elsewhere = outside.iter().any(|r| !r.forced && r.score >= threshold);
        let standing_forced = outside
            .iter()
            .filter(|r| r.forced)
            .map(|r| (r.score, r.listing_id))
            .max_by(|a, b| rank(*a, *b));

        if plan.published == 0
            && !published_elsewhere
            && standing.is_some()
            && self.config.fallback_enabled
        {
            let candidate = scored
                .iter()
                .map(|d| (d.score, d.listing_id))
                .max_by(|a, b| rank(*a, *b));
            plan.fallback = match (candidate, standing_forced) {
                (Some(new), Some(old)) if rank(old, new) == Ordering::Greater => None,
                (candidate, _) => candidate.map(|(_, listing_id)| listing_id),
            };
        }

        plan.retire_forced = standing.is_some()
            && (plan.published > 0 || published_elsewhere || plan.fallback.is_some());

        plan.writes = scored
            .into_iter()
            .map(|decision| {
                if plan.fallback == Some(decision.listing_id) {
                    PlannedWrite {
                        listing_id: decision.listing_id,
                        score: decision.score,
                        reason: best_effort_reason(decision.score, threshold),
                        forced: true,
                        mode: WriteMode::Upsert,
                    }
                } else {
                    PlannedWrite {
                        listing_id: decision.listing_id,
                        score: decision.score,
                        reason: decision.reason.clone(),
                        forced: false,
                        mode: if decision.meets(threshold) {
                            WriteMode::Upsert
                        } else {
                            WriteMode::RefreshOnly
                        },
                    }
                }
            })
            .collect();

        plan
    }
}

/// Higher score wins; ties go to the lower listing id so reruns pick the
/// same fallback.
fn rank(a: (f64, ListingId), b: (f64, ListingId)) -> Ordering {
    a.0.partial_cmp(&b.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.1.cmp(&a.1))
}

fn percent(score: f64) -> i64 {
    (score * 100.0).round() as i64
}

pub fn similarity_reason(score: f64) -> String {
    format!("{}% semantic similarity", percent(score))
}

pub fn best_effort_reason(score: f64, threshold: f64) -> String {
    format!(
        "{BEST_EFFORT_PREFIX}: {}% semantic similarity, below the {}% publication threshold",
        percent(score),
        percent(threshold)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: 7,
            program: Some("Computer Science".into()),
            citizenship: Some("Canadian Citizen".into()),
            province: Some("Ontario".into()),
            embedding: Some(vec![1.0, 0.0]),
            ..Profile::default()
        }
    }

    fn listing(id: ListingId, description: &str, embedding: Option<Vec<f32>>) -> Listing {
        Listing {
            id,
            title: format!("Listing {id}"),
            description: description.into(),
            embedding,
            ..Listing::default()
        }
    }

    fn scored(id: ListingId, score: f64) -> PairOutcome {
        PairOutcome::Scored(MatchDecision {
            listing_id: id,
            score,
            reason: similarity_reason(score),
            source: ScoreSource::Similarity,
        })
    }

    #[test]
    fn universal_listing_scores_fixed_value() {
        let engine = MatchingEngine::default();
        let l = listing(1, "Open to all students across the country", None);

        let outcome = engine.decide(&profile(), &l);
        let decision = outcome.decision().expect("universal decision");
        assert_eq!(decision.score, 0.95);
        assert!(decision.reason.contains("universal"));
        assert_eq!(decision.source, ScoreSource::Universal);
    }

    #[test]
    fn program_gate_runs_before_universal_check() {
        let engine = MatchingEngine::default();
        // Easy-entry + region would make this universal, but the law-only
        // wording is rejected by the gate first.
        let l = listing(
            2,
            "Law students only. Field of study: Law. Random draw for Ontario residents.",
            Some(vec![1.0, 0.0]),
        );

        let outcome = engine.decide(&profile(), &l);
        assert!(matches!(
            outcome,
            PairOutcome::Skip {
                reason: SkipReason::ProgramGate { .. },
                ..
            }
        ));
    }

    #[test]
    fn similarity_score_and_reason() {
        let engine = MatchingEngine::default();
        let l = listing(3, "Award for software students", Some(vec![0.6, 0.8]));

        let decision = engine.decide(&profile(), &l).decision().cloned().unwrap();
        assert!((decision.score - 0.6).abs() < 1e-6);
        assert_eq!(decision.reason, "60% semantic similarity");
    }

    #[test]
    fn negative_similarity_clamps_to_zero() {
        let engine = MatchingEngine::default();
        let l = listing(4, "Award for software students", Some(vec![-1.0, 0.0]));

        let decision = engine.decide(&profile(), &l).decision().cloned().unwrap();
        assert_eq!(decision.score, 0.0);
    }

    #[test]
    fn missing_or_mismatched_embeddings_skip() {
        let engine = MatchingEngine::default();
        let missing = listing(5, "Award for software students", None);
        let mismatched = listing(6, "Award for software students", Some(vec![1.0, 0.0, 1.0]));

        assert!(matches!(
            engine.decide(&profile(), &missing),
            PairOutcome::Skip {
                reason: SkipReason::MissingEmbedding {
                    profile_missing: false,
                    listing_missing: true
                },
                ..
            }
        ));
        assert!(matches!(
            engine.decide(&profile(), &mismatched),
            PairOutcome::Skip {
                reason: SkipReason::NotComputable,
                ..
            }
        ));
    }

    #[test]
    fn plan_upserts_published_and_refreshes_the_rest() {
        let engine = MatchingEngine::default();
        let plan = engine.plan(7, &[scored(1, 0.8), scored(2, 0.3)]);

        assert_eq!(plan.published, 1);
        assert_eq!(plan.below_threshold, 1);
        assert_eq!(plan.fallback, None);
        assert_eq!(plan.writes[0].mode, WriteMode::Upsert);
        assert_eq!(plan.writes[1].mode, WriteMode::RefreshOnly);
        assert!(!plan.writes.iter().any(|w| w.forced));
        assert_eq!(plan.best_similarity, Some(0.8));
    }

    #[test]
    fn plan_forces_single_best_match_when_nothing_clears() {
        let engine = MatchingEngine::default();
        let plan = engine.plan(7, &[scored(1, 0.1), scored(2, 0.2), scored(3, 0.05)]);

        assert_eq!(plan.fallback, Some(2));
        let forced: Vec<_> = plan.writes.iter().filter(|w| w.forced).collect();
        assert_eq!(forced.len(), 1);
        assert_eq!(forced[0].listing_id, 2);
        assert_eq!(forced[0].mode, WriteMode::Upsert);
        assert!(forced[0].reason.starts_with(BEST_EFFORT_PREFIX));
        assert_eq!(
            plan.writes
                .iter()
                .filter(|w| w.mode == WriteMode::Upsert)
                .count(),
            1
        );
    }

    #[test]
    fn fallback_ties_pick_lowest_listing_id() {
        let engine = MatchingEngine::default();
        let plan = engine.plan(7, &[scored(9, 0.2), scored(4, 0.2)]);
        assert_eq!(plan.fallback, Some(4));
    }

    #[test]
    fn no_scores_means_no_fallback() {
        let engine = MatchingEngine::default();
        let skip = PairOutcome::Skip {
            listing_id: 1,
            reason: SkipReason::MissingEmbedding {
                profile_missing: false,
                listing_missing: true,
            },
        };
        let plan = engine.plan(7, &[skip]);

        assert!(plan.writes.is_empty());
        assert_eq!(plan.fallback, None);
        assert_eq!(plan.skipped.len(), 1);
    }

    #[test]
    fn fallback_can_be_disabled() {
        let engine = MatchingEngine::new(MatchingEngineConfig {
            fallback_enabled: false,
            ..MatchingEngineConfig::default()
        });
        let plan = engine.plan(7, &[scored(1, 0.1)]);

        assert_eq!(plan.fallback, None);
        assert_eq!(plan.writes[0].mode, WriteMode::RefreshOnly);
    }

    fn record(listing_id: ListingId, score: f64, forced: bool) -> MatchRecord {
        let now = chrono::Utc::now();
        MatchRecord {
            profile_id: 7,
            listing_id,
            score,
            reason: similarity_reason(score),
            forced,
            status: crate::ApplicationStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn universal_wording_beats_exclusion_keywords() {
        let engine = MatchingEngine::default();
        let l = listing(
            8,
            "Open to all students, including law programs",
            Some(vec![0.0, 1.0]),
        );

        let decision = engine.decide(&profile(), &l).decision().cloned().unwrap();
        assert_eq!(decision.score, 0.95);
        assert_eq!(decision.source, ScoreSource::Universal);
    }

    #[test]
    fn published_record_elsewhere_suppresses_fallback() {
        let engine = MatchingEngine::default();
        let standing = [record(10, 0.9, false)];
        let plan = engine.plan_against(7, &[scored(11, 0.2)], Some(&standing[..]));

        assert_eq!(plan.fallback, None);
        assert_eq!(plan.writes[0].mode, WriteMode::RefreshOnly);
        assert!(!plan.writes[0].forced);
        assert!(plan.retire_forced);
    }

    #[test]
    fn standing_forced_record_keeps_its_place_unless_beaten() {
        let engine = MatchingEngine::default();
        let standing = [record(11, 0.2, true)];

        let weaker = engine.plan_against(7, &[scored(12, 0.1)], Some(&standing[..]));
        assert_eq!(weaker.fallback, None);
        assert!(!weaker.retire_forced);

        let stronger = engine.plan_against(7, &[scored(13, 0.3)], Some(&standing[..]));
        assert_eq!(stronger.fallback, Some(13));
        assert!(stronger.retire_forced);
    }

    #[test]
    fn standing_records_inside_the_batch_are_superseded() {
        let engine = MatchingEngine::default();
        // listing 11 was forced before; the batch re-scores it
        let standing = [record(11, 0.2, true)];
        let plan = engine.plan_against(7, &[scored(11, 0.1), scored(12, 0.15)], Some(&standing[..]));

        assert_eq!(plan.fallback, Some(12));
        assert!(plan.retire_forced);
    }

    #[test]
    fn unknown_standing_records_disable_fallback() {
        let engine = MatchingEngine::default();
        let plan = engine.plan_against(7, &[scored(1, 0.1), scored(2, 0.9)], None);
        assert_eq!(plan.published, 1);
        assert!(!plan.retire_forced);

        let plan = engine.plan_against(7, &[scored(1, 0.1)], None);
        assert_eq!(plan.fallback, None);
        assert!(plan.writes.iter().all(|w| w.mode == WriteMode::RefreshOnly));
    }

    #[test]
    fn surfaces_threshold_and_forced_records() {
        let config = MatchingEngineConfig::default();
        assert!(config.surfaces(0.5, false));
        assert!(!config.surfaces(0.3, false));
        assert!(config.surfaces(0.2, true));
    }
}
