use super::phrases::{EASY_ENTRY_PHRASES, UNIVERSAL_PHRASES};
use crate::{
    Listing, Profile,
    corrections::region::{has_regional_signal, is_region_source, mentions_region},
    normalize::{combined_listing_text, contains_any},
};

/// Universal geographic eligibility.
///
/// Only profiles with a regional-citizenship signal qualify. The listing
/// must either state universal eligibility outright, or combine easy-entry
/// wording (random draw, no essay, ...) with a region mention or a
/// region-affiliated source.
pub fn is_universal_match(listing: &Listing, profile: &Profile) -> bool {
    if !has_regional_signal(profile) {
        return false;
    }

    let text = combined_listing_text(listing);
    universal_text(&text, &listing.source)
}

pub(crate) fn universal_text(text: &str, source: &str) -> bool {
    if contains_any(text, UNIVERSAL_PHRASES) {
        return true;
    }

    contains_any(text, EASY_ENTRY_PHRASES) && (mentions_region(text) || is_region_source(source))
}
