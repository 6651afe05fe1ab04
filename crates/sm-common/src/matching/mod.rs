pub mod decision;
pub mod engine;
pub mod phrases;
pub mod program_gate;
pub mod similarity;
pub mod universal;

pub use decision::{GateDecision, MatchDecision, PairOutcome, ScoreSource, SkipReason};
pub use engine::{MatchPlan, MatchingEngine, MatchingEngineConfig, PlannedWrite, WriteMode};
pub use program_gate::{admits, evaluate_program_gate};
pub use similarity::cosine_similarity;
pub use universal::is_universal_match;
