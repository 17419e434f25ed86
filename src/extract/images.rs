//! Product image discovery
//!
//! Collects `<img>` candidates from profile and generic gallery selectors,
//! resolves each to an absolute URL, drops site chrome, and ranks what is left
//! so the most likely product shot comes first.

use std::collections::HashSet;

use tracing::debug;

use crate::error::PageError;
use crate::image_url;
use crate::page::{Element, ProductPage, select_all};
use crate::profiles::SiteProfile;
use crate::utils::constants::{MIN_FALLBACK_IMAGE_EDGE, PRODUCT_ALT_KEYWORDS, PRODUCT_ALT_SCORE};

/// Gallery selectors tried after the profile's own
pub const GENERIC_IMAGE_SELECTORS: &[&str] = &[
    "[itemprop='image']",
    ".product-image img",
    ".product-images img",
    ".product-gallery img",
    ".product-detail img",
    "[class*='gallery'] img",
    "[class*='product'] picture img",
    "[data-testid*='image'] img",
];

#[derive(Debug, Clone)]
struct ScoredImage {
    url: String,
    score: f64,
}

/// Ranked, de-duplicated absolute image URLs for the page
pub async fn collect(
    page: &dyn ProductPage,
    page_url: &str,
    profile: Option<&SiteProfile>,
) -> Result<Vec<String>, PageError> {
    let profile_selectors = profile
        .map(|p| p.selectors.image.iter().map(String::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut scored = Vec::new();
    for selector in profile_selectors
        .iter()
        .copied()
        .chain(GENERIC_IMAGE_SELECTORS.iter().copied())
    {
        for el in select_all(page, selector).await? {
            if let Some(image) = score_element(&el, page_url) {
                scored.push(image);
            }
        }
    }

    if scored.is_empty() {
        debug!("No gallery images matched, scanning every <img>");
        for el in select_all(page, "img").await? {
            if !large_enough(&el) {
                continue;
            }
            if let Some(image) = score_element(&el, page_url) {
                scored.push(image);
            }
        }
    }

    Ok(rank(scored))
}

/// Best source URL an element carries, before resolution
///
/// Preference: widest `srcset` / `data-srcset` entry, then the lazy-load
/// attributes, then plain `src`. `<meta>` and `<link>` image tags are read
/// through `content` / `href`.
pub fn richest_source(el: &Element) -> Option<(String, Option<u32>)> {
    for attr in ["srcset", "data-srcset"] {
        if let Some(best) = el.attribute(attr).and_then(image_url::best_srcset_candidate) {
            return Some((best.url, best.width));
        }
    }

    ["data-lazy-src", "data-src", "src", "content", "href"]
        .iter()
        .find_map(|attr| el.attribute(attr))
        .map(|url| (url.to_string(), None))
}

fn score_element(el: &Element, page_url: &str) -> Option<ScoredImage> {
    let (raw, srcset_width) = richest_source(el)?;
    if raw.starts_with("data:") {
        return None;
    }

    let url = image_url::normalize(&raw, page_url);
    if image_url::is_skipped(&url) {
        debug!("Skipping chrome image {}", url);
        return None;
    }

    Some(ScoredImage {
        score: score(el, srcset_width),
        url,
    })
}

/// Alt-text bonus plus one point per ten pixels of width
fn score(el: &Element, srcset_width: Option<u32>) -> f64 {
    let alt = el.attribute("alt").unwrap_or_default().to_lowercase();
    let alt_bonus = if PRODUCT_ALT_KEYWORDS.iter().any(|k| alt.contains(k)) {
        PRODUCT_ALT_SCORE
    } else {
        0.0
    };

    let width = srcset_width
        .map(f64::from)
        .or_else(|| dimension_attr(el, "width"))
        .or_else(|| el.rect.map(|r| r.width))
        .unwrap_or(0.0);

    alt_bonus + width / 10.0
}

fn dimension_attr(el: &Element, name: &str) -> Option<f64> {
    el.attribute(name)?
        .trim_end_matches("px")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Fallback filter: both edges at least the minimum when size is known
fn large_enough(el: &Element) -> bool {
    let size = el.rect.map(|r| (r.width, r.height)).or_else(|| {
        Some((dimension_attr(el, "width")?, dimension_attr(el, "height")?))
    });

    match size {
        Some((w, h)) => w >= MIN_FALLBACK_IMAGE_EDGE && h >= MIN_FALLBACK_IMAGE_EDGE,
        None => true,
    }
}

/// Stable sort by score, highest first, then drop repeated URLs
fn rank(mut scored: Vec<ScoredImage>) -> Vec<String> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen = HashSet::new();
    scored
        .into_iter()
        .filter(|img| seen.insert(img.url.clone()))
        .map(|img| img.url)
        .collect()
}
