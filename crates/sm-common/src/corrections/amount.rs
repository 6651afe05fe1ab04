use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?P<currency>\$|\b(?:cad|usd)\s*)?(?P<digits>\d[\d,]*(?:\.\d+)?)(?:\s*(?P<k>k\b))?(?:\s*(?P<unit>cad\b|usd\b|dollars\b))?",
    )
    .unwrap()
});

/// Award amount as delivered by the scraper feed: either a number or a
/// currency-formatted string such as `"$5,000"` or `"Up to $2.5k"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

/// Normalizes a raw amount to a positive number.
///
/// Non-numeric text, zero and negative values all mean "amount unknown" and
/// return `None`; a listing is never surfaced as a $0 award.
pub fn normalize_amount(raw: &RawAmount) -> Option<f64> {
    match raw {
        RawAmount::Number(value) => positive(*value),
        RawAmount::Text(text) => parse_amount_text(text),
    }
}

/// How much a figure looks like money. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Confidence {
    /// A bare 19xx/20xx token, most likely an academic year.
    YearLike,
    Bare,
    /// Next to a currency marker or a `k` suffix.
    Marked,
}

/// Extracts the award amount from free text.
///
/// Only figures of the most money-like kind present are considered, and the
/// largest of those wins so ranges and "up to" phrasing resolve to the award
/// ceiling.
pub fn parse_amount_text(text: &str) -> Option<f64> {
    let figures: Vec<(Confidence, f64)> = RE_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.name("digits")?.as_str();
            let value: f64 = raw.replace(',', "").parse().ok()?;
            let thousands = caps.name("k").is_some();
            let marked = thousands || caps.name("currency").is_some() || caps.name("unit").is_some();
            let confidence = if marked {
                Confidence::Marked
            } else if is_year_like(raw) {
                Confidence::YearLike
            } else {
                Confidence::Bare
            };
            let multiplier = if thousands { 1000.0 } else { 1.0 };
            Some((confidence, value * multiplier))
        })
        .collect();

    let best = figures.iter().map(|(confidence, _)| *confidence).max()?;
    figures
        .into_iter()
        .filter(|(confidence, _)| *confidence == best)
        .filter_map(|(_, value)| positive(value))
        .reduce(f64::max)
}

fn is_year_like(raw: &str) -> bool {
    raw.len() == 4
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw.starts_with("19") || raw.starts_with("20"))
}

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}
