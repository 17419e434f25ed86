//! DOM tiers of the cascade
//!
//! Profile selectors first, then generic selectors that hold across most
//! storefront themes, then a currency regex over the body text for price.
//! Only fields still empty after the structured and custom tiers are looked up.

use tracing::debug;

use super::{ProductFields, element_value, images};
use crate::domain;
use crate::error::PageError;
use crate::page::{ProductPage, select_all};
use crate::price::{self, PriceToken};
use crate::profiles::SiteProfile;

pub const GENERIC_TITLE_SELECTORS: &[&str] = &[
    "h1[itemprop='name']",
    "[itemprop='name']",
    ".product-name",
    ".product-title",
    "[data-testid*='title']",
    "h1",
];

pub const GENERIC_PRICE_SELECTORS: &[&str] = &[
    "[itemprop='price']",
    ".product-price",
    ".price-current",
    ".current-price",
    ".sale-price",
    ".price",
    "[data-testid*='price']",
    "[class*='price']",
];

pub const GENERIC_ORIGINAL_PRICE_SELECTORS: &[&str] = &[
    "del",
    "s",
    ".old-price",
    ".original-price",
    ".price-old",
    "[class*='old-price']",
    "[class*='original-price']",
];

pub const GENERIC_DISCOUNT_SELECTORS: &[&str] = &[
    ".discount-message",
    ".discount",
    "[class*='discount']",
    "[class*='campaign-text']",
];

pub const GENERIC_BRAND_SELECTORS: &[&str] = &[
    "[itemprop='brand'] [itemprop='name']",
    "[itemprop='brand']",
    ".product-brand",
    ".brand-name",
    ".brand",
];

/// Candidates taken from each price selector that matches
const MAX_PRICE_MATCHES: usize = 3;

/// Fill empty fields from the DOM
///
/// Images are always collected: the gallery extends `images` even when an
/// earlier tier already chose the primary image.
pub async fn fill(
    page: &dyn ProductPage,
    page_url: &str,
    profile: Option<&SiteProfile>,
    fields: &mut ProductFields,
) -> Result<(), PageError> {
    let selectors = profile.map(|p| &p.selectors);
    let mut found = ProductFields::default();

    if fields.title.is_none() {
        let profile_titles = selectors.map(|s| s.title.as_slice()).unwrap_or_default();
        found.title = first_value(page, profile_titles, GENERIC_TITLE_SELECTORS).await?;
        if found.title.is_none() {
            found.title = Some(page.title().await?).filter(|t| !t.is_empty());
        }
    }

    if fields.price.is_none() {
        if let Some((current, original)) = dom_prices(page, profile).await? {
            found.price = Some(current);
            found.original_price = original;
        }
    }

    if fields.discount_message.is_none() {
        let profile_discounts = selectors.map(|s| s.discount.as_slice()).unwrap_or_default();
        found.discount_message =
            first_value(page, profile_discounts, GENERIC_DISCOUNT_SELECTORS).await?;
    }

    let gallery = images::collect(page, page_url, profile).await?;
    found.image = gallery.first().cloned();
    found.images = gallery;

    if fields.brand.is_none() {
        found.brand = brand(page, page_url, profile).await?;
    }

    let filled = fields.fill_missing(found);
    debug!("DOM tiers filled {:?}", filled);
    Ok(())
}

/// Value of the first element, across profile then generic selectors, that has one
async fn first_value(
    page: &dyn ProductPage,
    profile_selectors: &[String],
    generic: &[&str],
) -> Result<Option<String>, PageError> {
    for selector in profile_selectors
        .iter()
        .map(String::as_str)
        .chain(generic.iter().copied())
    {
        for el in select_all(page, selector).await? {
            if let Some(value) = element_value(&el) {
                return Ok(Some(value));
            }
        }
    }
    Ok(None)
}

/// Price and optional pre-discount price from selectors, else from body text
async fn dom_prices(
    page: &dyn ProductPage,
    profile: Option<&SiteProfile>,
) -> Result<Option<(f64, Option<f64>)>, PageError> {
    let (profile_price, profile_original) = profile
        .map(|p| (p.selectors.price.as_slice(), p.selectors.original_price.as_slice()))
        .unwrap_or_default();

    let mut tokens = first_price_match(page, profile_price, GENERIC_PRICE_SELECTORS).await?;

    if tokens.is_empty() {
        let body = page
            .query_selector("body")
            .await?
            .map(|el| el.text)
            .unwrap_or_default();
        tokens = price::scan_text(&body);
        if !tokens.is_empty() {
            debug!("Price recovered from page text: {:?}", tokens);
        }
    } else {
        let originals = profile_original
            .iter()
            .map(String::as_str)
            .chain(GENERIC_ORIGINAL_PRICE_SELECTORS.iter().copied());
        for selector in originals {
            let candidates = price_tokens(page, selector).await?;
            if !candidates.is_empty() {
                tokens.extend(candidates);
                break;
            }
        }
    }

    Ok(price::pair(&tokens))
}

/// Valid candidates from the first selector that yields any
async fn first_price_match(
    page: &dyn ProductPage,
    profile_selectors: &[String],
    generic: &[&str],
) -> Result<Vec<PriceToken>, PageError> {
    for selector in profile_selectors
        .iter()
        .map(String::as_str)
        .chain(generic.iter().copied())
    {
        let tokens = price_tokens(page, selector).await?;
        if !tokens.is_empty() {
            debug!("Price selector '{}' matched {:?}", selector, tokens);
            return Ok(tokens);
        }
    }
    Ok(Vec::new())
}

async fn price_tokens(page: &dyn ProductPage, selector: &str) -> Result<Vec<PriceToken>, PageError> {
    Ok(select_all(page, selector)
        .await?
        .iter()
        .filter_map(element_value)
        .filter_map(|raw| price::parse_candidate(&raw))
        .take(MAX_PRICE_MATCHES)
        .collect())
}

/// Brand from selectors, then the profile's literal name, then the domain
async fn brand(
    page: &dyn ProductPage,
    page_url: &str,
    profile: Option<&SiteProfile>,
) -> Result<Option<String>, PageError> {
    let entries = profile.map(|p| p.selectors.brand.as_slice()).unwrap_or_default();
    let (selector_entries, literals): (Vec<String>, Vec<String>) = entries
        .iter()
        .cloned()
        .partition(|entry| looks_like_selector(entry));

    if let Some(brand) = first_value(page, &selector_entries, GENERIC_BRAND_SELECTORS).await? {
        return Ok(Some(brand));
    }

    Ok(literals
        .into_iter()
        .map(|l| l.trim().to_string())
        .find(|l| !l.is_empty())
        .or_else(|| domain::brand_token(page_url)))
}

/// Brand entries without any CSS punctuation are literal brand names
fn looks_like_selector(entry: &str) -> bool {
    entry.contains(['.', '#', '[', ']', '>', '+', ':'])
}
