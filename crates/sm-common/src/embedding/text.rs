//! Text fed to the embedding provider. Profile and listing text must stay
//! stable across runs so cached embeddings remain comparable.

use crate::{Listing, Profile};

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One attribute per line; blank attributes are dropped.
pub fn profile_text(profile: &Profile) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(school) = non_blank(profile.school.as_deref()) {
        lines.push(school.to_string());
    }
    if let Some(program) = non_blank(profile.program.as_deref()) {
        lines.push(program.to_string());
    }
    if let Some(gpa) = profile.gpa.filter(|g| g.is_finite()) {
        lines.push(format!("GPA: {gpa}"));
    }
    if let Some(province) = non_blank(profile.province.as_deref()) {
        lines.push(format!("Province: {province}"));
    }
    if let Some(citizenship) = non_blank(profile.citizenship.as_deref()) {
        lines.push(format!("Citizenship: {citizenship}"));
    }
    if let Some(ethnicity) = non_blank(profile.ethnicity.as_deref()) {
        lines.push(format!("Ethnicity: {ethnicity}"));
    }

    let interests: Vec<&str> = profile
        .interests
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .collect();
    if !interests.is_empty() {
        lines.push(interests.join(", "));
    }

    if let Some(note) = non_blank(profile.demographics.as_deref()) {
        lines.push(note.to_string());
    }

    lines.join("\n")
}

pub fn listing_text(listing: &Listing) -> String {
    std::iter::once(listing.title.as_str())
        .chain(std::iter::once(listing.description.as_str()))
        .chain(listing.eligibility.iter().map(String::as_str))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
