//! Pure text parsers for noisy detail-panel values.
//!
//! Panel text arrives in human formats ("2k+", "(1,234)", "R$ 1.200,50") and
//! these helpers turn it into typed values. Unparseable input yields `None`
//! so the caller stores NULL instead of garbage.

use once_cell::sync::Lazy;
use regex::Regex;

static THOUSANDS_SHORTHAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:k\+?)").expect("valid regex"));

static GROUPED_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})*").expect("valid regex"));

static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(R\$|\$|€|£)\s?(\d{1,3}(?:[.,]\d{3})*)([.,]\d{2})?").expect("valid regex"));

static AT_COORDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").expect("valid regex"));

static BANG_COORDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!3d(-?\d+\.\d+)!4d(-?\d+\.\d+)").expect("valid regex"));

/// Parse a review count out of panel text.
///
/// Handles the "2k+" shorthand, thousands-grouped numbers embedded in labels
/// like "(1,234 reviews)", and plain integers.
#[must_use]
pub fn parse_rating_count(value: &str) -> Option<i64> {
    if value.contains('k')
        && let Some(caps) = THOUSANDS_SHORTHAND_RE.captures(value)
    {
        return caps[1].parse::<i64>().ok().map(|n| n * 1000);
    }

    if let Some(m) = GROUPED_NUMBER_RE.find(value) {
        return m.as_str().replace(',', "").parse().ok();
    }

    value.trim().parse().ok()
}

/// Parse a rating value such as "4.7" or "4,7" out of panel text
#[must_use]
pub fn parse_rating(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse().ok()
}

/// Extract the currency-prefixed price from a longer label.
///
/// Matches `R$`, `$`, `€` and `£` with optional thousands grouping and cents.
/// When no currency pattern is present the raw text is kept as-is; prices are
/// display strings, not numbers.
#[must_use]
pub fn parse_price(value: &str) -> String {
    match PRICE_RE.find(value) {
        Some(m) => m.as_str().to_string(),
        None => value.to_string(),
    }
}

/// Recover `(latitude, longitude)` from a map URL.
///
/// The viewport `@lat,lon` segment is preferred; deep links without it carry
/// the place position in a `!3d<lat>!4d<lon>` parameter pair.
#[must_use]
pub fn parse_coordinates(url: &str) -> Option<(f64, f64)> {
    for re in [&*AT_COORDS_RE, &*BANG_COORDS_RE] {
        if let Some(caps) = re.captures(url) {
            let lat = caps[1].parse::<f64>().ok()?;
            let lon = caps[2].parse::<f64>().ok()?;
            return Some((lat, lon));
        }
    }
    None
}

/// Extract the leading integer from text like "5-star hotel"
#[must_use]
pub fn parse_leading_int(value: &str) -> Option<i64> {
    static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
    INT_RE.find(value)?.as_str().parse().ok()
}

/// Join a list column for storage, `';'`-separated, order preserved
#[must_use]
pub fn join_list(values: &[String]) -> String {
    values.join(";")
}

/// Split a stored list column back into its items
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(';').map(str::to_string).collect()
}
