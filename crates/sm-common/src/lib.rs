pub mod corrections;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod profiles;
pub mod rematch;
pub mod run_id;
pub mod store;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

pub type ProfileId = i64;
pub type ListingId = i64;

// Shared data models for the matching core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub school: Option<String>,
    pub program: Option<String>,
    pub gpa: Option<f64>,
    pub province: Option<String>,
    pub citizenship: Option<String>,
    pub ethnicity: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub demographics: Option<String>,
    /// Cached profile embedding; regenerated whenever the profile changes.
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    /// Normalized award amount. `None` means unknown, never a $0 award.
    pub amount: Option<f64>,
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub eligibility: Vec<String>,
    #[serde(default)]
    pub source: String,
    pub embedding: Option<Vec<f32>>,
}

/// Listing fields as accepted by a store before an id is assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewListing {
    pub title: String,
    pub amount: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub description: String,
    pub eligibility: Vec<String>,
    pub source: String,
    pub embedding: Option<Vec<f32>>,
}

/// Application progress. Owned by the student workflow; the matching engine
/// only ever writes the default on creation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
pub enum ApplicationStatus {
    #[default]
    #[serde(rename = "Not Started")]
    #[strum(serialize = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    Submitted,
    Awarded,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub profile_id: ProfileId,
    pub listing_id: ListingId,
    pub score: f64,
    pub reason: String,
    /// Set when the record is the best-effort fallback for its profile.
    pub forced: bool,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_display_names() {
        assert_eq!(ApplicationStatus::NotStarted.as_ref(), "Not Started");
        assert_eq!(ApplicationStatus::InProgress.as_ref(), "In Progress");
        assert_eq!(
            ApplicationStatus::from_str("Submitted").unwrap(),
            ApplicationStatus::Submitted
        );
        assert!(ApplicationStatus::from_str("Withdrawn").is_err());
    }

    #[test]
    fn status_serializes_with_spaces() {
        let json = serde_json::to_string(&ApplicationStatus::NotStarted).unwrap();
        assert_eq!(json, "\"Not Started\"");
        assert_eq!(ApplicationStatus::default(), ApplicationStatus::NotStarted);
    }
}
