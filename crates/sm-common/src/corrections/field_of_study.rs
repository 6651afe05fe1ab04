use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::normalize::contains_term;

pub const COMPUTER_SCIENCE: &str = "computer science";
pub const ENGINEERING: &str = "engineering";
pub const BUSINESS: &str = "business";
pub const HEALTH: &str = "health";
pub const LAW: &str = "law";
pub const ARTS: &str = "arts";
pub const SCIENCE: &str = "science";
pub const EDUCATION: &str = "education";

/// Program wording → canonical field. Checked in order, first hit wins, so
/// longer phrases sit above the generic words they contain.
const FIELD_SYNONYMS: &[(&str, &str)] = &[
    ("computer engineering", ENGINEERING),
    ("software engineering", COMPUTER_SCIENCE),
    ("computer science", COMPUTER_SCIENCE),
    ("data science", COMPUTER_SCIENCE),
    ("information technology", COMPUTER_SCIENCE),
    ("cs", COMPUTER_SCIENCE),
    ("software", COMPUTER_SCIENCE),
    ("computing", COMPUTER_SCIENCE),
    ("programming", COMPUTER_SCIENCE),
    ("engineering", ENGINEERING),
    ("engineer", ENGINEERING),
    ("mechanical", ENGINEERING),
    ("electrical", ENGINEERING),
    ("civil", ENGINEERING),
    ("commerce", BUSINESS),
    ("finance", BUSINESS),
    ("accounting", BUSINESS),
    ("business", BUSINESS),
    ("economics", BUSINESS),
    ("marketing", BUSINESS),
    ("management", BUSINESS),
    ("mba", BUSINESS),
    ("nursing", HEALTH),
    ("medicine", HEALTH),
    ("medical", HEALTH),
    ("pharmacy", HEALTH),
    ("kinesiology", HEALTH),
    ("health", HEALTH),
    ("juris doctor", LAW),
    ("law", LAW),
    ("legal", LAW),
    ("humanities", ARTS),
    ("music", ARTS),
    ("history", ARTS),
    ("english", ARTS),
    ("philosophy", ARTS),
    ("arts", ARTS),
    ("art", ARTS),
    ("biology", SCIENCE),
    ("chemistry", SCIENCE),
    ("physics", SCIENCE),
    ("mathematics", SCIENCE),
    ("math", SCIENCE),
    ("science", SCIENCE),
    ("education", EDUCATION),
    ("teaching", EDUCATION),
];

lazy_static! {
    /// Keywords that mark a listing as relevant to the field.
    pub static ref FIELD_KEYWORDS: HashMap<&'static str, Vec<&'static str>> = {
        let mut m = HashMap::new();
        m.insert(COMPUTER_SCIENCE, vec![
            "computer science", "computer", "computing", "software", "programming",
            "coding", "technology", "tech", "information technology", "data science", "stem",
        ]);
        m.insert(ENGINEERING, vec![
            "engineering", "engineer", "applied science", "technology", "stem",
        ]);
        m.insert(BUSINESS, vec![
            "business", "commerce", "finance", "accounting", "economics", "management",
            "marketing", "entrepreneur", "entrepreneurship", "mba",
        ]);
        m.insert(HEALTH, vec![
            "health", "healthcare", "nursing", "medicine", "medical", "pharmacy",
            "dentistry", "kinesiology", "public health",
        ]);
        m.insert(LAW, vec!["law", "legal", "juris", "pre-law", "justice"]);
        m.insert(ARTS, vec![
            "arts", "art", "humanities", "music", "history", "literature", "english",
            "philosophy", "fine arts", "theatre", "design", "creative",
        ]);
        m.insert(SCIENCE, vec![
            "science", "biology", "chemistry", "physics", "mathematics", "math",
            "research", "stem",
        ]);
        m.insert(EDUCATION, vec!["education", "teaching", "teacher", "pedagogy"]);
        m
    };

    /// Unrelated-field keywords a field should not match. Hand-tuned and
    /// intentionally uneven (engineering excludes arts, business does not).
    pub static ref FIELD_EXCLUSIONS: HashMap<&'static str, Vec<&'static str>> = {
        let mut m = HashMap::new();
        m.insert(COMPUTER_SCIENCE, vec![
            "law", "legal", "nursing", "medicine", "medical", "dentistry", "pharmacy",
            "music", "fine arts", "theatre", "dance", "journalism", "education", "teaching",
            "business", "accounting", "social work",
        ]);
        m.insert(ENGINEERING, vec![
            "law", "nursing", "medicine", "arts", "music", "journalism", "business",
            "education",
        ]);
        m.insert(BUSINESS, vec![
            "nursing", "medicine", "engineering", "law", "music", "computer science",
        ]);
        m.insert(HEALTH, vec![
            "law", "engineering", "business", "music", "computer science", "journalism",
        ]);
        m.insert(LAW, vec![
            "nursing", "medicine", "engineering", "computer science", "music",
        ]);
        m.insert(ARTS, vec![
            "engineering", "computer science", "nursing", "medicine", "accounting", "law",
        ]);
        m.insert(SCIENCE, vec!["law", "business", "music", "journalism", "fine arts"]);
        m.insert(EDUCATION, vec![
            "engineering", "computer science", "law", "medicine", "nursing",
        ]);
        m
    };
}

/// A profile's program mapped onto the keyword tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOfStudy {
    /// Program recognised by the synonym table.
    Canonical(&'static str),
    /// Unrecognised program, kept as lower-cased text. Carries no keyword
    /// or exclusion set.
    Other(String),
}

impl FieldOfStudy {
    pub fn name(&self) -> &str {
        match self {
            FieldOfStudy::Canonical(name) => *name,
            FieldOfStudy::Other(name) => name.as_str(),
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            FieldOfStudy::Canonical(name) => FIELD_KEYWORDS
                .get(name)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            FieldOfStudy::Other(_) => &[],
        }
    }

    pub fn exclusions(&self) -> &'static [&'static str] {
        match self {
            FieldOfStudy::Canonical(name) => FIELD_EXCLUSIONS
                .get(name)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            FieldOfStudy::Other(_) => &[],
        }
    }
}

/// Maps free-text wording ("BSc Computing", "Commerce") to its canonical
/// field, if the synonym table knows it.
pub fn canonical_field(text: &str) -> Option<&'static str> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    FIELD_SYNONYMS
        .iter()
        .find(|(synonym, _)| contains_term(&lowered, synonym))
        .map(|(_, field)| *field)
}

/// Normalizes a profile program. Blank programs yield `None`.
pub fn normalize_program(program: &str) -> Option<FieldOfStudy> {
    let lowered = program.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    Some(match canonical_field(&lowered) {
        Some(field) => FieldOfStudy::Canonical(field),
        None => FieldOfStudy::Other(lowered),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_collapse_to_canonical_fields() {
        assert_eq!(canonical_field("CS"), Some(COMPUTER_SCIENCE));
        assert_eq!(canonical_field("Software Development"), Some(COMPUTER_SCIENCE));
        assert_eq!(canonical_field("BSc Computing"), Some(COMPUTER_SCIENCE));
        assert_eq!(canonical_field("Commerce"), Some(BUSINESS));
        assert_eq!(canonical_field("Finance"), Some(BUSINESS));
        assert_eq!(canonical_field("Accounting"), Some(BUSINESS));
        assert_eq!(canonical_field("Health Sciences"), Some(HEALTH));
    }

    #[test]
    fn longer_phrases_win_over_contained_words() {
        assert_eq!(canonical_field("Computer Engineering"), Some(ENGINEERING));
        assert_eq!(canonical_field("Computer Science"), Some(COMPUTER_SCIENCE));
    }

    #[test]
    fn unknown_programs_keep_their_text() {
        assert_eq!(
            normalize_program("  Viticulture "),
            Some(FieldOfStudy::Other("viticulture".into()))
        );
        assert!(normalize_program("   ").is_none());
        assert!(FieldOfStudy::Other("viticulture".into()).exclusions().is_empty());
    }

    #[test]
    fn exclusion_table_is_preserved_as_authored() {
        let engineering = FieldOfStudy::Canonical(ENGINEERING);
        let business = FieldOfStudy::Canonical(BUSINESS);
        assert!(engineering.exclusions().contains(&"arts"));
        assert!(!business.exclusions().contains(&"arts"));
    }

    #[test]
    fn every_canonical_field_has_both_tables() {
        for (_, field) in FIELD_SYNONYMS {
            assert!(FIELD_KEYWORDS.contains_key(field), "missing keywords for {field}");
            assert!(FIELD_EXCLUSIONS.contains_key(field), "missing exclusions for {field}");
        }
    }
}
