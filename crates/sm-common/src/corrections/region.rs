use url::Url;

use crate::{Profile, normalize::contains_any};

/// Province / territory names and national terms that count as a region
/// mention in listing text.
pub const REGION_NAMES: &[&str] = &[
    "ontario",
    "quebec",
    "québec",
    "british columbia",
    "alberta",
    "manitoba",
    "saskatchewan",
    "nova scotia",
    "new brunswick",
    "newfoundland",
    "labrador",
    "prince edward island",
    "yukon",
    "nunavut",
    "northwest territories",
    "canada",
    "canadian",
    "canadians",
];

/// Aggregators whose listings are region-affiliated regardless of wording.
pub const REGION_SOURCE_DOMAINS: &[&str] = &[
    "scholarshipscanada.com",
    "studentawards.com",
    "yconic.com",
    "universitystudy.ca",
    "canada.ca",
];

/// Whether the profile carries a regional-citizenship signal: citizen or
/// permanent-resident status, or any stated province.
pub fn has_regional_signal(profile: &Profile) -> bool {
    let citizenship = profile
        .citizenship
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .unwrap_or_default();

    if citizenship.contains("citizen") || citizenship.contains("permanent resident") {
        return true;
    }

    profile
        .province
        .as_deref()
        .is_some_and(|province| !province.trim().is_empty())
}

/// Region name mentioned in already lower-cased listing text.
pub fn mentions_region(text: &str) -> bool {
    contains_any(text, REGION_NAMES)
}

/// Whether the listing source points at a region-affiliated domain.
///
/// Accepts full URLs and bare host names; any `.ca` host qualifies.
pub fn is_region_source(source: &str) -> bool {
    let trimmed = source.trim().to_lowercase();
    if trimmed.is_empty() {
        return false;
    }

    let host = Url::parse(&trimmed)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| {
            trimmed
                .split(['/', '?', '#'])
                .next()
                .unwrap_or_default()
                .to_string()
        });
    let host = host.trim_start_matches("www.");

    host.ends_with(".ca")
        || REGION_SOURCE_DOMAINS
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}
