use once_cell::sync::Lazy;
use regex::Regex;

use crate::Listing;

static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Title key used to detect the same scholarship scraped twice.
///
/// Lower-cases, drops punctuation and collapses whitespace, so
/// `"The  Loran Award!"` and `"the loran award"` share a key.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let stripped = RE_NON_WORD.replace_all(&lowered, "");
    RE_WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Lower-cased title + description + eligibility, the text every keyword
/// heuristic searches.
pub fn combined_listing_text(listing: &Listing) -> String {
    let mut parts = Vec::with_capacity(listing.eligibility.len() + 2);
    parts.push(listing.title.as_str());
    parts.push(listing.description.as_str());
    parts.extend(listing.eligibility.iter().map(String::as_str));

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Word-boundary containment on already lower-cased text.
///
/// `"law"` matches `"law students"` and `"pre-law"` but not `"lawn"` or
/// `"outlaw"`.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }

    haystack.match_indices(term).any(|(start, matched)| {
        let end = start + matched.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

pub fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| contains_term(haystack, term))
}
