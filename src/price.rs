//! Price normalization
//!
//! Storefronts print prices as `1.299,99 TL`, `1,299.99`, `₺129,90` or plain
//! `99.00`. Parsing disambiguates the separators; formatting always produces the
//! Turkish canonical form `1.299,99 TL`.
//!
//! Two parse entry points exist because trust differs by source:
//! - [`parse`] for JSON-LD / meta values, which are taken as-is
//! - [`parse_candidate`] for text scraped off the DOM, which must also fall
//!   inside a plausible price range

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::utils::constants::{CURRENCY_SUFFIX, PRICE_SANITY_MAX, PRICE_SANITY_MIN};

/// Upper bound on currency matches taken from free page text
const MAX_TEXT_CANDIDATES: usize = 5;

/// Number adjacent to a TL / ₺ marker, on either side
static CURRENCY_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    let amount = r"\d{1,3}(?:[.,]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?";
    Regex::new(&format!(
        r"(?i)(?:(?:₺|\bTL)\s*(?P<pre>{amount}))|(?:(?P<post>{amount})\s*(?:TL\b|₺))"
    ))
    .expect("currency regex is valid")
});

/// A raw price string together with its parsed value
#[derive(Debug, Clone, PartialEq)]
pub struct PriceToken {
    pub raw: String,
    pub value: f64,
}

/// Parse a price string, disambiguating decimal and thousands separators
///
/// Everything except digits, `,` and `.` is dropped. When both separators
/// occur, the one occurring last is the decimal separator. A lone separator
/// kind is also decimal, so `"1.299"` parses as 1.299, not 1299.
///
/// Returns `None` when no digit survives cleaning.
pub fn parse(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == ',' || c == '.');

    if !cleaned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    // Byte offsets are safe: the cleaned string is pure ASCII
    let decimal_at = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) => Some(comma.max(dot)),
        (Some(comma), None) => Some(comma),
        (None, Some(dot)) => Some(dot),
        (None, None) => None,
    };

    let mut normalized = String::with_capacity(cleaned.len());
    for (i, b) in cleaned.bytes().enumerate() {
        if b.is_ascii_digit() {
            normalized.push(b as char);
        } else if Some(i) == decimal_at {
            normalized.push('.');
        }
    }

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a DOM-sourced price, rejecting values outside the sanity range
pub fn parse_candidate(raw: &str) -> Option<PriceToken> {
    let Some(value) = parse(raw) else {
        debug!("Discarding price candidate without a number: {:?}", raw);
        return None;
    };

    if !(PRICE_SANITY_MIN..=PRICE_SANITY_MAX).contains(&value) {
        debug!("Discarding out-of-range price candidate {:?} ({})", raw, value);
        return None;
    }

    Some(PriceToken {
        raw: raw.trim().to_string(),
        value,
    })
}

/// Render a price as `#.###,## TL`
pub fn format(value: f64) -> String {
    let cents = (value.max(0.0) * 100.0).round() as u64;
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{grouped},{:02} {CURRENCY_SUFFIX}", cents % 100)
}

/// Pick `(price, original_price)` from a set of candidates on one page
///
/// The lowest value is the price actually charged; the highest, when it
/// differs, is the crossed-out pre-discount price.
pub fn pair(tokens: &[PriceToken]) -> Option<(f64, Option<f64>)> {
    let min = tokens.iter().map(|t| t.value).reduce(f64::min)?;
    let max = tokens.iter().map(|t| t.value).reduce(f64::max)?;

    let original = (!same_amount(min, max)).then_some(max);
    Some((min, original))
}

/// Whether two prices are equal once rounded to cents
pub fn same_amount(a: f64, b: f64) -> bool {
    (a * 100.0).round() == (b * 100.0).round()
}

/// Find currency-marked amounts in free text, in order of appearance
pub fn scan_text(text: &str) -> Vec<PriceToken> {
    CURRENCY_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| caps.name("pre").or_else(|| caps.name("post")))
        .filter_map(|m| parse_candidate(m.as_str()))
        .take(MAX_TEXT_CANDIDATES)
        .collect()
}
