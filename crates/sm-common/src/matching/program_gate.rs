use once_cell::sync::Lazy;
use regex::Regex;

use super::{decision::GateDecision, phrases::UNIVERSAL_PHRASES};
use crate::{
    Listing, Profile,
    corrections::field_of_study::{FieldOfStudy, canonical_field, normalize_program},
    normalize::{combined_listing_text, contains_any, contains_term},
};

/// Explicit field statements, matched against lower-cased listing text.
static RE_EXPLICIT_FIELD: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"field of study\s*[:\-]\s*([a-z][a-z &/\-]*)",
        r"open (?:only )?to ([a-z][a-z &/\-]*?) students",
        r"\bfor ([a-z][a-z &/\-]*?) students",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Program-of-study gate as a plain yes/no.
pub fn admits(listing: &Listing, profile: &Profile) -> bool {
    evaluate_program_gate(listing, profile).is_admit()
}

/// Program-of-study gate.
///
/// Check order is fixed: missing program → universal wording → exclusion
/// keywords → explicit "field of study" phrase → default admit. Unclear
/// listings are treated as general purpose and let through.
pub fn evaluate_program_gate(listing: &Listing, profile: &Profile) -> GateDecision {
    let Some(field) = profile.program.as_deref().and_then(normalize_program) else {
        return GateDecision::Admit {
            basis: "no_program",
        };
    };

    let text = combined_listing_text(listing);
    evaluate_text(&text, &field)
}

pub(crate) fn evaluate_text(text: &str, field: &FieldOfStudy) -> GateDecision {
    if contains_any(text, UNIVERSAL_PHRASES) {
        return GateDecision::Admit {
            basis: "universal_listing",
        };
    }

    let own_keywords_present = contains_term(text, field.name()) || contains_any(text, field.keywords());
    if own_keywords_present {
        return GateDecision::Admit {
            basis: "field_keyword",
        };
    }

    if let Some(keyword) = field
        .exclusions()
        .iter()
        .find(|keyword| contains_term(text, keyword))
    {
        return GateDecision::Reject {
            reason: format!("exclusion_keyword: '{keyword}' excluded for {}", field.name()),
        };
    }

    for stated in explicit_fields(text) {
        if stated_field_is_excluded(&stated, field) {
            return GateDecision::Reject {
                reason: format!(
                    "explicit_field: listing targets '{stated}', excluded for {}",
                    field.name()
                ),
            };
        }
    }

    GateDecision::Admit { basis: "default" }
}

/// Field names stated explicitly in the listing text.
pub fn explicit_fields(text: &str) -> Vec<String> {
    RE_EXPLICIT_FIELD
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|stated| !stated.is_empty())
        .collect()
}

fn stated_field_is_excluded(stated: &str, field: &FieldOfStudy) -> bool {
    let exclusions = field.exclusions();
    if contains_any(stated, exclusions) {
        return true;
    }

    match canonical_field(stated) {
        Some(stated_field) if stated_field != field.name() => exclusions
            .iter()
            .any(|keyword| *keyword == stated_field || canonical_field(keyword) == Some(stated_field)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(program: &str) -> Profile {
        Profile {
            id: 1,
            program: Some(program.into()),
            ..Profile::default()
        }
    }

    fn listing(title: &str, description: &str) -> Listing {
        Listing {
            id: 10,
            title: title.into(),
            description: description.into(),
            ..Listing::default()
        }
    }

    #[test]
    fn admits_everything_without_program() {
        let mut p = profile("");
        p.program = None;
        assert!(admits(&listing("Law Award", "law students only"), &p));
        assert!(admits(&listing("Law Award", "law students only"), &profile("   ")));
    }

    #[test]
    fn rejects_law_listing_for_computer_science() {
        let l = listing(
            "Bar Association Award",
            "Open only to Law students, field of study: Law",
        );
        let decision = evaluate_program_gate(&l, &profile("Computer Science"));
        assert!(decision.is_reject());
        assert!(decision.reason().unwrap().contains("law"));
    }

    #[test]
    fn universal_wording_overrides_exclusions() {
        let l = listing(
            "Community Award",
            "Open to all students, including law and nursing programs",
        );
        assert!(admits(&l, &profile("Computer Science")));
    }

    #[test]
    fn own_keyword_keeps_mixed_listing() {
        let l = listing(
            "Tech & Law Scholarship",
            "For students combining law with software development",
        );
        assert!(admits(&l, &profile("CS")));
    }

    #[test]
    fn explicit_field_phrase_catches_what_keywords_miss() {
        // "marketing" is not in the computer science exclusion list, but it
        // canonicalizes to business, which is.
        let l = listing("Ad Club Award", "For marketing students in their final year");
        let decision = evaluate_program_gate(&l, &profile("Software Engineering"));
        assert!(decision.is_reject());
        assert!(decision.reason().unwrap().starts_with("explicit_field"));
    }

    #[test]
    fn unclear_listings_default_to_admit() {
        let l = listing("Leadership Award", "Recognizes community leadership");
        assert_eq!(
            evaluate_program_gate(&l, &profile("Commerce")),
            GateDecision::Admit { basis: "default" }
        );
    }

    #[test]
    fn business_is_not_excluded_from_arts_listings() {
        let l = listing("Arts Council Grant", "Supports arts students");
        assert!(admits(&l, &profile("Finance")));
        assert!(!admits(&l, &profile("Mechanical Engineering")));
    }

    #[test]
    fn unknown_program_is_admitted() {
        let l = listing("Nursing Bursary", "for nursing students");
        assert!(admits(&l, &profile("Viticulture")));
    }

    #[test]
    fn extracts_explicit_fields() {
        let fields = explicit_fields("open only to law students, field of study: law");
        assert!(fields.contains(&"law".to_string()));
        assert!(explicit_fields("a general award").is_empty());
    }
}
