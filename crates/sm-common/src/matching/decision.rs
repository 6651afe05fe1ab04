use std::fmt;

use crate::ListingId;

/// Program-of-study gate verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Listing may proceed to the universal check and similarity scoring.
    Admit { basis: &'static str },
    /// Listing is categorically inadmissible for the profile.
    Reject { reason: String },
}

impl GateDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, GateDecision::Admit { .. })
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, GateDecision::Reject { .. })
    }

    /// Rejection reason (`None` when admitted).
    pub fn reason(&self) -> Option<&str> {
        match self {
            GateDecision::Reject { reason } => Some(reason),
            GateDecision::Admit { .. } => None,
        }
    }
}

/// Why a pair produced no score. A skip never touches an existing record.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    ProgramGate { reason: String },
    MissingEmbedding {
        profile_missing: bool,
        listing_missing: bool,
    },
    NotComputable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ProgramGate { reason } => write!(f, "program_gate: {reason}"),
            SkipReason::MissingEmbedding {
                profile_missing,
                listing_missing,
            } => write!(
                f,
                "missing_embedding: profile={profile_missing}, listing={listing_missing}"
            ),
            SkipReason::NotComputable => f.write_str("similarity_not_computable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    Universal,
    Similarity,
}

/// A computed score for one (profile, listing) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDecision {
    pub listing_id: ListingId,
    /// Score in [0, 1].
    pub score: f64,
    pub reason: String,
    pub source: ScoreSource,
}

impl MatchDecision {
    pub fn meets(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Skip {
        listing_id: ListingId,
        reason: SkipReason,
    },
    Scored(MatchDecision),
}

impl PairOutcome {
    pub fn listing_id(&self) -> ListingId {
        match self {
            PairOutcome::Skip { listing_id, .. } => *listing_id,
            PairOutcome::Scored(decision) => decision.listing_id,
        }
    }

    pub fn decision(&self) -> Option<&MatchDecision> {
        match self {
            PairOutcome::Scored(decision) => Some(decision),
            PairOutcome::Skip { .. } => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, PairOutcome::Skip { .. })
    }
}
